//! Column slots of a feed row.
//!
//! Each slot starts at a fixed offset: positive from the left edge,
//! negative from the right. A slot extends to where the next one starts;
//! the last one ends at the right edge.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Selection,
    Flags,
    Username,
    Relations,
    Body,
    Entities,
    Time,
}

/// Slot start offsets in screen order.
pub const SLOTS: [(ColumnKind, i32); 7] = [
    (ColumnKind::Selection, 0),
    (ColumnKind::Flags, 4),
    (ColumnKind::Username, 7),
    (ColumnKind::Relations, 24),
    (ColumnKind::Body, 26),
    (ColumnKind::Entities, -9),
    (ColumnKind::Time, -4),
];

/// Left offset of a left-anchored slot, for headers drawn outside rows.
pub fn left_of(kind: ColumnKind) -> u16 {
    SLOTS
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or(0, |(_, offset)| (*offset).max(0) as u16)
}

/// Slots resolved against one row width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBounds {
    width: u16,
    bounds: [(ColumnKind, Range<u16>); 7],
}

impl ColumnBounds {
    /// Resolves every slot for a row `width` cells wide. On narrow rows the
    /// right-anchored slots are pushed right so bounds never overlap.
    pub fn resolve(width: u16) -> Self {
        let absolute = |offset: i32| -> u16 {
            let x = if offset < 0 {
                width as i32 + offset
            } else {
                offset
            };
            x.clamp(0, width as i32) as u16
        };

        let mut starts = [0u16; 8];
        let mut floor = 0;
        for (i, (_, offset)) in SLOTS.iter().enumerate() {
            floor = absolute(*offset).max(floor);
            starts[i] = floor;
        }
        starts[7] = width.max(floor);

        let bounds = std::array::from_fn(|i| (SLOTS[i].0, starts[i]..starts[i + 1]));
        Self { width, bounds }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn get(&self, kind: ColumnKind) -> Range<u16> {
        self.bounds
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0..0, |(_, r)| r.clone())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_left_and_right_anchors() {
        let b = ColumnBounds::resolve(80);
        assert_eq!(b.get(ColumnKind::Selection), 0..4);
        assert_eq!(b.get(ColumnKind::Flags), 4..7);
        assert_eq!(b.get(ColumnKind::Username), 7..24);
        assert_eq!(b.get(ColumnKind::Relations), 24..26);
        assert_eq!(b.get(ColumnKind::Body), 26..71);
        assert_eq!(b.get(ColumnKind::Entities), 71..76);
        assert_eq!(b.get(ColumnKind::Time), 76..80);
    }

    #[test]
    fn narrow_rows_never_overlap() {
        let b = ColumnBounds::resolve(20);
        let mut previous_end = 0;
        for range in SLOTS.iter().map(|(kind, _)| b.get(*kind)) {
            assert!(range.start >= previous_end);
            assert!(range.start <= range.end);
            previous_end = range.end;
        }
        assert_eq!(b.get(ColumnKind::Body), 20..20);
        assert_eq!(b.get(ColumnKind::Time), 20..20);
    }

    #[test]
    fn header_offsets() {
        assert_eq!(left_of(ColumnKind::Username), 7);
        assert_eq!(left_of(ColumnKind::Body), 26);
        assert_eq!(left_of(ColumnKind::Time), 0);
    }
}
