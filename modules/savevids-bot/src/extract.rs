//! Pure extraction from fetched posts and mentions. No I/O.

use savevids_common::{Mention, Requester, SourcePost, VideoReference};

/// Best-bitrate video of the post's media, with its thumbnail.
///
/// Variants missing either a bitrate or a URL (streaming playlists, photos)
/// are ignored. On equal bitrates the first variant listed wins.
pub fn extract_video_reference(post: &SourcePost) -> Option<VideoReference> {
    let media = post.media.as_ref()?;

    let mut best: Option<(u64, &str)> = None;
    for variant in &media.variants {
        let (Some(bitrate), Some(url)) = (variant.bitrate, variant.url.as_deref()) else {
            continue;
        };
        if best.map_or(true, |(top, _)| bitrate > top) {
            best = Some((bitrate, url));
        }
    }

    best.map(|(_, url)| VideoReference {
        url: url.to_string(),
        thumbnail_url: media.thumbnail_url.clone(),
    })
}

/// The mention's author, normalized.
pub fn extract_requester(mention: &Mention) -> Requester {
    Requester {
        id: mention.author_id.clone(),
        handle: normalize_handle(&mention.author_handle),
        cleaned_text: clean_text(&mention.raw_text),
    }
}

/// Lowercase, without the leading `@`.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

/// Drop the leading run of `@handle` and link tokens. Everything from the
/// first other token onwards is kept as is.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .skip_while(|token| token.starts_with('@') || token.starts_with("http"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use savevids_common::{MediaContainer, MediaVariant};

    use super::*;

    fn post_with(variants: Vec<MediaVariant>) -> SourcePost {
        SourcePost {
            id: "2".to_string(),
            media: Some(MediaContainer {
                thumbnail_url: Some("https://pbs.twimg.com/thumb.jpg".to_string()),
                variants,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn highest_bitrate_wins() {
        let post = post_with(vec![MediaVariant::new(10000, "good"), MediaVariant::new(5000, "bad")]);
        let video = extract_video_reference(&post).unwrap();
        assert_eq!(video.url, "good");
        assert_eq!(video.thumbnail_url.as_deref(), Some("https://pbs.twimg.com/thumb.jpg"));
    }

    #[test]
    fn first_variant_wins_ties() {
        let post = post_with(vec![MediaVariant::new(832000, "first"), MediaVariant::new(832000, "second")]);
        assert_eq!(extract_video_reference(&post).unwrap().url, "first");
    }

    #[test]
    fn playlist_without_bitrate_is_skipped() {
        let playlist = MediaVariant {
            bitrate: None,
            url: Some("https://video.twimg.com/pl.m3u8".to_string()),
        };
        let post = post_with(vec![playlist.clone(), MediaVariant::new(256000, "mp4")]);
        assert_eq!(extract_video_reference(&post).unwrap().url, "mp4");

        assert!(extract_video_reference(&post_with(vec![playlist])).is_none());
    }

    #[test]
    fn post_without_media_has_no_video() {
        let post = SourcePost {
            id: "2".to_string(),
            ..Default::default()
        };
        assert!(extract_video_reference(&post).is_none());
        assert!(extract_video_reference(&post_with(vec![])).is_none());
    }

    #[test]
    fn clean_text_strips_only_leading_mentions_and_links() {
        assert_eq!(clean_text("@dllfd @ldsl je @tkfdl tranlfd lfdfd"), "je @tkfdl tranlfd lfdfd");
        assert_eq!(clean_text("@dllfd http://kkf"), "");
        assert_eq!(clean_text("https://t.co/x  hello   http://y"), "hello http://y");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn requester_handle_is_lowercased_without_at() {
        let mention = Mention {
            id: "m1".to_string(),
            author_id: "7".to_string(),
            author_handle: "@Didier".to_string(),
            raw_text: "@savevidsbot please".to_string(),
            in_reply_to_id: Some("2".to_string()),
        };
        let requester = extract_requester(&mention);
        assert_eq!(requester.id, "7");
        assert_eq!(requester.handle, "didier");
        assert_eq!(requester.cleaned_text, "please");
    }
}
