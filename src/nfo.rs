//! NFO sidecar rendering
//!
//! Renders the `<episodedetails>` XML document media-library front ends read
//! next to a video file. Rendering is a pure transform of the resolved
//! metadata and the fixed show facts from the configuration.

use crate::config::{ArchiveConfig, CastMember};
use crate::metadata_retrieval::EpisodeMetadata;
use chrono::{Local, TimeZone};
use quick_xml::escape::escape;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>"#;

/// `<br>`, `<br/>` and `<br />` in any case
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("line break pattern is valid"));

/// Strips markup from a description while keeping its explicit line breaks
///
/// Line-break markers become newlines first; every resulting line is then
/// converted to plain text on its own so the breaks survive.
pub fn strip_markup(description: &str) -> String {
    LINE_BREAK
        .split(description)
        .map(|line| nanohtml2text::html2text(line).trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Running time in whole hours, rounding halves to even
pub fn runtime_hours(duration_seconds: f64) -> i64 {
    (duration_seconds / 3600.0).round_ties_even() as i64
}

/// Local calendar date (`YYYY-MM-DD`) of an epoch-milliseconds timestamp
///
/// The milliseconds are truncated to whole seconds first.
pub fn aired_date(epoch_millis: i64) -> Option<String> {
    let seconds = epoch_millis / 1000;
    Local
        .timestamp_opt(seconds, 0)
        .earliest()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// Renders NFO sidecars for one show
#[derive(Debug, Clone)]
pub struct NfoSynthesizer {
    fallback_title: String,
    imdb_id: String,
    cast: Vec<CastMember>,
}

impl NfoSynthesizer {
    pub fn new(fallback_title: &str, imdb_id: &str, cast: Vec<CastMember>) -> Self {
        Self {
            fallback_title: fallback_title.to_string(),
            imdb_id: imdb_id.to_string(),
            cast,
        }
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(&config.show_title, &config.imdb_id, config.cast.clone())
    }

    /// Renders the sidecar document for an episode
    ///
    /// # Arguments
    ///
    /// * `metadata` - Resolved metadata of the episode
    /// * `poster` - Path of the saved thumbnail, if there is one
    pub fn render(&self, metadata: &EpisodeMetadata, poster: Option<&Path>) -> String {
        let identifier = metadata.identifier;
        let title = metadata.title.as_deref().unwrap_or(&self.fallback_title);

        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str("<episodedetails>\n");

        push_element(&mut xml, 1, "plot", &strip_markup(&metadata.description));
        xml.push_str("  <outline />\n");
        push_element(&mut xml, 1, "lockdata", "true");
        push_element(&mut xml, 1, "title", title);
        push_element(&mut xml, 1, "imdbid", &self.imdb_id);

        if let Some(duration) = metadata.duration_seconds {
            push_element(&mut xml, 1, "runtime", &runtime_hours(duration).to_string());
        }

        if let Some(poster) = poster {
            xml.push_str("  <art>\n");
            push_element(&mut xml, 2, "poster", &poster.display().to_string());
            xml.push_str("  </art>\n");
        }

        for member in &self.cast {
            xml.push_str("  <actor>\n");
            push_element(&mut xml, 2, "name", &member.name);
            push_element(&mut xml, 2, "role", &member.role);
            push_element(&mut xml, 2, "type", &member.kind);
            push_element(&mut xml, 2, "sortorder", &member.sort_order.to_string());
            xml.push_str("  </actor>\n");
        }

        push_element(&mut xml, 1, "episode", &identifier.episode.to_string());
        push_element(&mut xml, 1, "season", &identifier.season.to_string());

        if let Some(aired) = metadata.air_date_epoch_millis.and_then(aired_date) {
            push_element(&mut xml, 1, "aired", &aired);
        }

        xml.push_str("</episodedetails>\n");
        xml
    }
}

fn push_element(xml: &mut String, depth: usize, name: &str, text: &str) {
    xml.push_str(&"  ".repeat(depth));
    xml.push_str(&format!("<{name}>{}</{name}>\n", escape(text)));
}
