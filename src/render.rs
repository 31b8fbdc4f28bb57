use crate::models::{PlaylistItem, Snapshot};

const LINK_STYLE: &str = "color: #373737;";

/// Build the HTML digest body: a header card for the playlist followed by
/// one table per newly-added track.
pub fn digest_html(title: &str, playlist: &Snapshot, new_items: &[PlaylistItem]) -> String {
    let mut doc = String::with_capacity(2048);
    doc.push_str("<!DOCTYPE html><html><head><title>");
    doc.push_str(&esc(title));
    doc.push_str("</title></head><body>");

    doc.push_str(
        "<div style=\"font-family: arial, serif;border: 1px solid #99ff99; \
         padding: 3px; width: 600px; margin: auto; background-color: #99ff99;\">",
    );

    // Header card: artwork on the left, name and description on the right.
    doc.push_str("<table><tr><td>");
    let playlist_href = playlist.external_url.as_deref().unwrap_or("#");
    doc.push_str(&format!("<a href=\"{}\">", esc(playlist_href)));
    if let Some(art) = &playlist.artwork_url {
        doc.push_str(&format!(
            "<img src=\"{}\" width=\"200px\" height=\"200px\">",
            esc(art)
        ));
    }
    doc.push_str("</a></td>");
    doc.push_str("<td style=\"vertical-align: text-top; padding-left: 10px;\">");
    doc.push_str("<div style=\"text-align: center;\">New music was added to</div>");
    doc.push_str(&format!(
        "<h2><a href=\"{}\" style=\"{}\">{}</a></h2>",
        esc(playlist_href),
        LINK_STYLE,
        esc(&playlist.name)
    ));
    doc.push_str(&format!(
        "<h3 style=\"text-align: center;\">{}</h3>",
        esc(&playlist.description)
    ));
    doc.push_str("</td></tr></table>");

    doc.push_str("<hr size=\"1\" color=\"black\" width=\"90%\">");
    doc.push_str(
        "<div style=\"margin-top: 10px; margin-bottom: 10px;\">The following tracks where added:</div>",
    );

    for item in new_items {
        doc.push_str(&track_table(item));
    }

    doc.push_str("</div></body></html>");
    doc
}

fn track_table(item: &PlaylistItem) -> String {
    let track = &item.track;
    let track_href = track.external_url.as_deref().unwrap_or("#");

    let mut t = String::with_capacity(512);
    t.push_str(
        "<table style=\"border: 1px solid black; width:100%; \
         margin-bottom: 10px; font-size: 14px;\">",
    );

    t.push_str("<td width=\"100px;\" style=\"width: 100px;\">");
    if let Some(art) = &track.album.artwork_url {
        t.push_str(&format!(
            "<a href=\"{}\"><img src=\"{}\"></a>",
            esc(track_href),
            esc(art)
        ));
    }
    t.push_str("</td><td><table>");

    t.push_str(&row("Artist(s):", &artist_links(item)));
    t.push_str(&row(
        "Title:",
        &format!(
            "<a href=\"{}\" style=\"{}\">{}</a>",
            esc(track_href),
            LINK_STYLE,
            esc(&track.name)
        ),
    ));
    let album_href = track.album.external_url.as_deref().unwrap_or("#");
    t.push_str(&row(
        "Album:",
        &format!(
            "<a href=\"{}\" style=\"{}\">{}</a>",
            esc(album_href),
            LINK_STYLE,
            esc(&track.album.name)
        ),
    ));

    t.push_str("</table></td></table>");
    t
}

fn row(label: &str, value_html: &str) -> String {
    format!(
        "<tr><td style=\"text-align: right; padding-right: 5px;\">{}</td><td>{}</td></tr>",
        label, value_html
    )
}

/// Comma-separated artist list; artists with a link become anchors, the
/// rest stay plain text.
fn artist_links(item: &PlaylistItem) -> String {
    let mut out = String::new();
    for (i, artist) in item.track.artists.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match &artist.external_url {
            Some(url) => out.push_str(&format!(
                "<a href=\"{}\" style=\"{}\">{}</a>",
                esc(url),
                LINK_STYLE,
                esc(&artist.name)
            )),
            None => out.push_str(&esc(&artist.name)),
        }
    }
    out
}

/// Minimal HTML escaping for provider-supplied text.
fn esc(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
