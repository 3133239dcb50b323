use std::fmt::Write as _;

use crate::{
    foundation::core::{Canvas, Rgba8},
    render::{layout::CardLayout, svg_raster::escape_xml},
    source::model::Post,
};

/// The four caption lines drawn on a card.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionText {
    pub title: String,
    pub author: String,
    pub karma: String,
    pub karma_colour: Rgba8,
    pub timestamp: String,
}

impl CaptionText {
    pub fn for_post(post: &Post, layout: &CardLayout) -> Self {
        let karma_colour = if post.score >= 0 {
            layout.karma_positive
        } else {
            layout.karma_negative
        };
        Self {
            title: truncate_chars(&post.title, layout.title_max_chars),
            author: format!("by /{}", post.author.display_name()),
            karma: format!("karma: {}", post.score),
            karma_colour,
            timestamp: format_timestamp(post, &layout.timestamp_format),
        }
    }
}

// An invalid user format string makes chrono's Display fail; fall back to RFC 3339.
fn format_timestamp(post: &Post, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", post.created_at.format(format)).is_err() {
        return post.created_at.to_rfc3339();
    }
    out
}

fn truncate_chars(text: &str, max: usize) -> String {
    let text = text.trim();
    if max == 0 || text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// A transparent SVG the size of the card holding every caption line.
pub fn caption_svg(caption: &CaptionText, layout: &CardLayout, canvas: Canvas) -> String {
    let Canvas { width, height } = canvas;
    let family = escape_xml(&layout.font_family);
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );

    let lines = [
        (&caption.title, layout.title, layout.text),
        (&caption.author, layout.author, layout.text),
        (&caption.karma, layout.karma, caption.karma_colour),
        (&caption.timestamp, layout.timestamp, layout.text),
    ];
    for (text, anchor, colour) in lines {
        if text.is_empty() {
            continue;
        }
        let _ = write!(
            svg,
            r#"<text x="{x}" y="{y}" font-family="{family}" font-size="{size}" text-anchor="middle" fill="{fill}" fill-opacity="{op}">{body}</text>"#,
            x = anchor.x,
            y = anchor.y,
            size = anchor.size,
            fill = colour.to_hex(),
            op = colour.opacity(),
            body = escape_xml(text),
        );
    }
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::source::model::Author;

    fn post(score: i64, author: Author) -> Post {
        Post {
            id: "p".into(),
            url: "https://i.redd.it/p.png".into(),
            title: "Look at <this> & that".into(),
            author,
            score,
            created_at: DateTime::from_timestamp(1_500_000_000, 0).unwrap(),
            permalink: "/r/pics/p".into(),
        }
    }

    #[test]
    fn karma_colour_follows_sign() {
        let layout = CardLayout::default();
        let up = CaptionText::for_post(&post(0, Author::Named("a".into())), &layout);
        let down = CaptionText::for_post(&post(-1, Author::Named("a".into())), &layout);
        assert_eq!(up.karma_colour, layout.karma_positive);
        assert_eq!(down.karma_colour, layout.karma_negative);
        assert_eq!(down.karma, "karma: -1");
    }

    #[test]
    fn lines_are_formatted() {
        let layout = CardLayout::default();
        let c = CaptionText::for_post(&post(5, Author::Deleted), &layout);
        assert_eq!(c.author, "by /[deleted]");
        assert_eq!(c.timestamp, "2017-07-14 02:40:00 UTC");

        let bad = CardLayout {
            timestamp_format: "%Q".into(),
            ..CardLayout::default()
        };
        let c = CaptionText::for_post(&post(5, Author::Deleted), &bad);
        assert_eq!(c.timestamp, "2017-07-14T02:40:00+00:00");
    }

    #[test]
    fn long_titles_are_truncated() {
        assert_eq!(truncate_chars("abcdef", 4), "abc…");
        assert_eq!(truncate_chars("  abc ", 4), "abc");
        assert_eq!(truncate_chars("abcdef", 0), "abcdef");
    }

    #[test]
    fn svg_is_escaped_and_centred() {
        let layout = CardLayout::default();
        let c = CaptionText::for_post(&post(5, Author::Named("a".into())), &layout);
        let svg = caption_svg(&c, &layout, layout.template_size);
        assert_eq!(svg.matches("text-anchor=\"middle\"").count(), 4);
        assert!(svg.contains("Look at &lt;this&gt; &amp; that"));
        assert!(svg.contains(&layout.karma_positive.to_hex()));
    }
}
