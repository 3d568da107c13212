//! # Text Segmentation
//!
//! Turns a post body into typed, width-measured pieces. The renderer maps
//! each piece's role to a style; the layout advances by each piece's
//! display width.
//!
//! ```text
//! "RT @ann: hi @bob see example.com/x\n#tag"
//!  └─┬┘└─┬──┘└┬┘└─┬┘└─┬┘└────┬───┘└┬┘└┬┘└┬─┘
//!   RT  user  txt men txt  domain route ↵  hashtag
//! ```
//!
//! Segmentation walks the post's entities in start order, bracketed by
//! zero-width marks at both ends of the text. Each entity becomes one
//! piece (links become two, domain then route, grouped together) and the
//! text between two entities becomes one plain piece. Raw newlines and
//! tabs are then split out into visible glyph pieces so a post never
//! spans more than one row in the list.
//!
//! Concatenating the pieces reproduces the *normalized* text: HTML
//! references decoded, links shown by their display form, and
//! whitespace glyphs standing in for the raw bytes (see [`Pieces::plain_text`]).

use unicode_width::UnicodeWidthStr;

use crate::core::post::{Entity, EntityKind, Post, User};
use crate::core::services::EntityDecoder;

/// A raw whitespace byte sequence replaced by a visible glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Glyph {
    Newline,
    CarriageNewline,
    CarriageReturn,
    Tab,
}

impl Glyph {
    /// The bytes this glyph replaced.
    pub fn raw(self) -> &'static str {
        match self {
            Glyph::Newline => "\n",
            Glyph::CarriageNewline => "\r\n",
            Glyph::CarriageReturn => "\r",
            Glyph::Tab => "\t",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Glyph::Tab => "⇥ ",
            _ => "↵ ",
        }
    }

    pub fn is_line_break(self) -> bool {
        !matches!(self, Glyph::Tab)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceRole {
    MentionUsername,
    Hashtag,
    LinkDomain,
    LinkRoute,
    Media,
    RepostMarker,
    RepostUsername,
    TextNormal,
    TextMention,
    TextOwnPost,
    TextRepost,
    Whitespace(Glyph),
    /// Stands in for content that could not be resolved (a missing original)
    Placeholder,
}

impl PieceRole {
    /// Roles the detail panel lets the user step through and act on.
    pub fn is_linking(self) -> bool {
        matches!(
            self,
            PieceRole::MentionUsername | PieceRole::Hashtag | PieceRole::LinkDomain | PieceRole::Media
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub role: PieceRole,
    pub text: String,
    /// Display cells, not bytes or chars
    pub width: usize,
    /// The entity this piece came from
    pub entity: Option<Entity>,
    /// Pieces sharing a group highlight together
    pub group: usize,
}

impl Piece {
    fn new(role: PieceRole, text: String, entity: Option<Entity>, group: usize) -> Self {
        let width = text.width();
        Self {
            role,
            text,
            width,
            entity,
            group,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pieces {
    pieces: Vec<Piece>,
    width: usize,
    chars: usize,
}

impl Pieces {
    fn from_vec(pieces: Vec<Piece>) -> Self {
        let width = pieces.iter().map(|p| p.width).sum();
        let chars = pieces.iter().map(|p| p.text.chars().count()).sum();
        Self {
            pieces,
            width,
            chars,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Piece> {
        self.pieces.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Piece> {
        self.pieces.get(index)
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Total display width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// True when some character is not exactly one cell wide. Per-character
    /// effects are disabled for such posts.
    pub fn has_wide_characters(&self) -> bool {
        self.width != self.chars
    }

    /// Indices of the pieces the detail panel can select.
    pub fn linking(&self) -> Vec<usize> {
        self.pieces
            .iter()
            .enumerate()
            .filter(|(_, p)| p.role.is_linking())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn in_group(&self, group: usize) -> impl Iterator<Item = &Piece> {
        self.pieces.iter().filter(move |p| p.group == group)
    }

    /// Normalized text with whitespace glyphs mapped back to their raw bytes.
    pub fn plain_text(&self) -> String {
        self.pieces
            .iter()
            .map(|p| match p.role {
                PieceRole::Whitespace(glyph) => glyph.raw(),
                _ => p.text.as_str(),
            })
            .collect()
    }
}

/// Segments post bodies for one viewer.
pub struct Segmenter<'a> {
    pub decoder: &'a EntityDecoder,
    pub viewer: Option<&'a User>,
}

impl<'a> Segmenter<'a> {
    pub fn new(decoder: &'a EntityDecoder, viewer: Option<&'a User>) -> Self {
        Self { decoder, viewer }
    }

    /// Segment `post`. For a repost, `original` is the reposted post; when it
    /// is missing the pieces degrade to a placeholder.
    pub fn segment(&self, post: &Post, original: Option<&Post>) -> Pieces {
        let mut groups = 0usize;
        let mut next_group = || {
            groups += 1;
            groups
        };

        if post.is_repost() {
            let mut pieces = vec![Piece::new(
                PieceRole::RepostMarker,
                "RT ".to_string(),
                None,
                next_group(),
            )];
            match original {
                Some(original) => {
                    let author = Entity {
                        start: 0,
                        end: 0,
                        kind: EntityKind::Mention {
                            user_id: original.author.id,
                            handle: original.author.handle.clone(),
                        },
                    };
                    pieces.push(Piece::new(
                        PieceRole::RepostUsername,
                        format!("@{}: ", original.author.handle),
                        Some(author),
                        next_group(),
                    ));
                    self.segment_body(original, PieceRole::TextRepost, &mut next_group, &mut pieces);
                }
                None => pieces.push(Piece::new(
                    PieceRole::Placeholder,
                    "(original unavailable)".to_string(),
                    None,
                    next_group(),
                )),
            }
            return Pieces::from_vec(split_whitespace(pieces));
        }

        let mut pieces = Vec::new();
        self.segment_body(post, self.text_role(post), &mut next_group, &mut pieces);
        Pieces::from_vec(split_whitespace(pieces))
    }

    fn text_role(&self, post: &Post) -> PieceRole {
        match self.viewer {
            Some(viewer) if post.mentions(&viewer.handle) => PieceRole::TextMention,
            Some(viewer) if post.author.id == viewer.id => PieceRole::TextOwnPost,
            _ => PieceRole::TextNormal,
        }
    }

    fn segment_body(
        &self,
        post: &Post,
        text_role: PieceRole,
        next_group: &mut impl FnMut() -> usize,
        out: &mut Vec<Piece>,
    ) {
        let text = post.text.as_str();
        let entities = ordered_entities(text, &post.entities);

        // Zero-width marks bracket the walk so the leading and trailing text
        // become gap pieces like everything else.
        let mut cursor = 0usize;
        for entity in entities {
            self.push_text(&text[cursor..entity.start], text_role, next_group, out);
            self.push_entity(text, entity, next_group, out);
            cursor = entity.end;
        }
        self.push_text(&text[cursor..], text_role, next_group, out);
    }

    fn push_text(
        &self,
        raw: &str,
        role: PieceRole,
        next_group: &mut impl FnMut() -> usize,
        out: &mut Vec<Piece>,
    ) {
        if raw.is_empty() {
            return;
        }
        out.push(Piece::new(role, self.decoder.decode(raw), None, next_group()));
    }

    fn push_entity(
        &self,
        text: &str,
        entity: &Entity,
        next_group: &mut impl FnMut() -> usize,
        out: &mut Vec<Piece>,
    ) {
        let group = next_group();
        match &entity.kind {
            EntityKind::Mention { .. } => out.push(Piece::new(
                PieceRole::MentionUsername,
                self.decoder.decode(&text[entity.start..entity.end]),
                Some(entity.clone()),
                group,
            )),
            EntityKind::Hashtag { .. } => out.push(Piece::new(
                PieceRole::Hashtag,
                self.decoder.decode(&text[entity.start..entity.end]),
                Some(entity.clone()),
                group,
            )),
            EntityKind::Link { display_url, .. } => match display_url.find('/') {
                Some(slash) => {
                    out.push(Piece::new(
                        PieceRole::LinkDomain,
                        display_url[..slash].to_string(),
                        Some(entity.clone()),
                        group,
                    ));
                    out.push(Piece::new(
                        PieceRole::LinkRoute,
                        display_url[slash..].to_string(),
                        Some(entity.clone()),
                        group,
                    ));
                }
                None => out.push(Piece::new(
                    PieceRole::LinkDomain,
                    display_url.clone(),
                    Some(entity.clone()),
                    group,
                )),
            },
            EntityKind::Media { display_url, .. } => out.push(Piece::new(
                PieceRole::Media,
                display_url.clone(),
                Some(entity.clone()),
                group,
            )),
        }
    }
}

/// Entities sorted by start, deduplicated by start, with anything that
/// does not describe a valid, non-overlapping span of `text` dropped.
fn ordered_entities<'e>(text: &str, entities: &'e [Entity]) -> Vec<&'e Entity> {
    let mut sorted: Vec<&Entity> = entities.iter().collect();
    sorted.sort_by_key(|e| e.start);
    sorted.dedup_by_key(|e| e.start);

    let mut cursor = 0usize;
    sorted
        .into_iter()
        .filter(|e| {
            let valid = e.start >= cursor
                && e.start <= e.end
                && e.end <= text.len()
                && text.is_char_boundary(e.start)
                && text.is_char_boundary(e.end);
            if valid {
                cursor = e.end;
            }
            valid
        })
        .collect()
}

/// Splits raw newline and tab bytes out of every piece into glyph pieces.
/// Pieces without such bytes are kept whole so their grouping survives.
fn split_whitespace(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut out = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if !piece.text.contains(['\r', '\n', '\t']) {
            out.push(piece);
            continue;
        }

        let mut run = String::new();
        let mut chars = piece.text.chars().peekable();
        while let Some(c) = chars.next() {
            let glyph = match c {
                '\r' if chars.peek() == Some(&'\n') => {
                    chars.next();
                    Some(Glyph::CarriageNewline)
                }
                '\r' => Some(Glyph::CarriageReturn),
                '\n' => Some(Glyph::Newline),
                '\t' => Some(Glyph::Tab),
                _ => None,
            };
            match glyph {
                Some(glyph) => {
                    if !run.is_empty() {
                        out.push(Piece::new(
                            piece.role,
                            std::mem::take(&mut run),
                            piece.entity.clone(),
                            piece.group,
                        ));
                    }
                    out.push(Piece::new(
                        PieceRole::Whitespace(glyph),
                        glyph.symbol().to_string(),
                        None,
                        piece.group,
                    ));
                }
                None => run.push(c),
            }
        }
        if !run.is_empty() {
            out.push(Piece::new(piece.role, run, piece.entity.clone(), piece.group));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{hashtag, link, mention, post, user};

    fn segment(post: &Post, original: Option<&Post>, viewer: Option<&User>) -> Pieces {
        Segmenter::new(&EntityDecoder, viewer).segment(post, original)
    }

    fn roles(pieces: &Pieces) -> Vec<PieceRole> {
        pieces.iter().map(|p| p.role).collect()
    }

    #[test]
    fn plain_post_is_one_text_piece() {
        let p = post(1, user(1, "ann"), "just text");
        let pieces = segment(&p, None, None);
        assert_eq!(roles(&pieces), vec![PieceRole::TextNormal]);
        assert_eq!(pieces.plain_text(), "just text");
    }

    #[test]
    fn entities_split_text_into_typed_pieces() {
        let mut p = post(1, user(1, "ann"), "hi @bob see #rust now");
        p.entities = vec![hashtag(&p.text, "#rust"), mention(&p.text, "@bob", 2)];
        let pieces = segment(&p, None, None);

        assert_eq!(
            roles(&pieces),
            vec![
                PieceRole::TextNormal,
                PieceRole::MentionUsername,
                PieceRole::TextNormal,
                PieceRole::Hashtag,
                PieceRole::TextNormal,
            ]
        );
        assert_eq!(pieces.plain_text(), "hi @bob see #rust now");
    }

    #[test]
    fn links_become_grouped_domain_and_route() {
        let mut p = post(1, user(1, "ann"), "read https://t.co/xyz ok");
        p.entities = vec![link(&p.text, "https://t.co/xyz", "example.com/a/b")];
        let pieces = segment(&p, None, None);

        let domain = pieces.get(1).unwrap();
        let route = pieces.get(2).unwrap();
        assert_eq!(domain.role, PieceRole::LinkDomain);
        assert_eq!(domain.text, "example.com");
        assert_eq!(route.role, PieceRole::LinkRoute);
        assert_eq!(route.text, "/a/b");
        assert_eq!(domain.group, route.group);
        assert_eq!(pieces.in_group(domain.group).count(), 2);
        assert_eq!(pieces.plain_text(), "read example.com/a/b ok");
    }

    #[test]
    fn duplicate_and_out_of_range_entities_are_ignored() {
        let mut p = post(1, user(1, "ann"), "@bob hi");
        let m = mention(&p.text, "@bob", 2);
        let mut broken = m.clone();
        broken.start = 3;
        broken.end = 99;
        p.entities = vec![m.clone(), m, broken];
        let pieces = segment(&p, None, None);
        assert_eq!(
            roles(&pieces),
            vec![PieceRole::MentionUsername, PieceRole::TextNormal]
        );
    }

    #[test]
    fn whitespace_bytes_become_glyph_pieces() {
        let p = post(1, user(1, "ann"), "one\ntwo\tthree\r\nfour");
        let pieces = segment(&p, None, None);

        let glyphs: Vec<_> = pieces
            .iter()
            .filter_map(|p| match p.role {
                PieceRole::Whitespace(g) => Some(g),
                _ => None,
            })
            .collect();
        assert_eq!(
            glyphs,
            vec![Glyph::Newline, Glyph::Tab, Glyph::CarriageNewline]
        );
        assert!(pieces.iter().all(|p| !p.text.contains(['\n', '\t', '\r'])));
        assert_eq!(pieces.plain_text(), "one\ntwo\tthree\r\nfour");
    }

    #[test]
    fn html_references_are_decoded_per_piece() {
        let p = post(1, user(1, "ann"), "fish &amp; chips");
        let pieces = segment(&p, None, None);
        assert_eq!(pieces.plain_text(), "fish & chips");
        assert_eq!(pieces.width(), "fish & chips".len());
    }

    #[test]
    fn width_counts_display_cells() {
        let p = post(1, user(1, "ann"), "日本語 ok");
        let pieces = segment(&p, None, None);
        assert_eq!(pieces.width(), 9);
        assert!(pieces.has_wide_characters());

        let ascii = segment(&post(2, user(1, "ann"), "plain"), None, None);
        assert!(!ascii.has_wide_characters());
    }

    #[test]
    fn total_width_matches_text_width() {
        let mut p = post(1, user(1, "ann"), "héllo @bøb ünïcode 漢字 #tag");
        p.entities = vec![mention(&p.text, "@bøb", 2), hashtag(&p.text, "#tag")];
        let pieces = segment(&p, None, None);
        assert_eq!(pieces.width(), p.text.as_str().width());
        assert_eq!(pieces.plain_text(), p.text);
    }

    #[test]
    fn repost_has_marker_and_author_prefix() {
        let original = post(10, user(2, "bob"), "original words");
        let mut repost = post(11, user(1, "ann"), "RT @bob: original words");
        repost.repost_of = Some(10);

        let pieces = segment(&repost, Some(&original), None);
        assert_eq!(
            roles(&pieces),
            vec![
                PieceRole::RepostMarker,
                PieceRole::RepostUsername,
                PieceRole::TextRepost
            ]
        );
        assert_eq!(pieces.plain_text(), "RT @bob: original words");
        match &pieces.get(1).unwrap().entity.as_ref().unwrap().kind {
            EntityKind::Mention { user_id, .. } => assert_eq!(*user_id, 2),
            other => panic!("unexpected entity {other:?}"),
        }
    }

    #[test]
    fn repost_without_original_is_a_placeholder() {
        let mut repost = post(11, user(1, "ann"), "RT @bob: gone");
        repost.repost_of = Some(10);
        let pieces = segment(&repost, None, None);
        assert_eq!(
            roles(&pieces),
            vec![PieceRole::RepostMarker, PieceRole::Placeholder]
        );
    }

    #[test]
    fn viewer_relation_picks_text_role() {
        let viewer = user(1, "me");
        let own = post(1, viewer.clone(), "my words");
        let mentioning = post(2, user(2, "bob"), "hey @ME");
        let other = post(3, user(2, "bob"), "hey all");

        assert_eq!(roles(&segment(&own, None, Some(&viewer))), vec![PieceRole::TextOwnPost]);
        assert_eq!(
            roles(&segment(&mentioning, None, Some(&viewer))),
            vec![PieceRole::TextMention]
        );
        assert_eq!(roles(&segment(&other, None, Some(&viewer))), vec![PieceRole::TextNormal]);
    }

    #[test]
    fn linking_lists_actionable_pieces() {
        let mut p = post(1, user(1, "ann"), "@bob x https://t.co/a");
        p.entities = vec![
            mention(&p.text, "@bob", 2),
            link(&p.text, "https://t.co/a", "example.com/a"),
        ];
        let pieces = segment(&p, None, None);
        let linking = pieces.linking();
        assert_eq!(linking.len(), 2);
        assert_eq!(pieces.get(linking[1]).unwrap().role, PieceRole::LinkDomain);
    }
}
