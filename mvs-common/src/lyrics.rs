//! Lyrics sectioning
//!
//! Splits a free-text lyrics block into labelled song sections (intro, verses,
//! pre-chorus, chorus, bridge, final chorus, outro). Each section later drives
//! one prompt-generation call and one image.
//!
//! # Rules
//! - A marker line is a line whose text, after stripping surrounding
//!   brackets, parentheses, colons and whitespace, names a section
//!   (case-insensitive): `[Verse 2]`, `Chorus:`, `(Pre-Chorus)`.
//! - Lyric lines before the first marker open an implicit Verse 1.
//! - Blank lines never close a section; only the next marker or end of input does.
//! - Only the first Chorus and the first PreChorus open a section. Later
//!   markers of the same kind are skipped; see [`RepeatPolicy`] for the lines
//!   that follow them.
//! - Sections without lyric lines are dropped.
//! - Output is in source order. Use [`sort_canonical`] for song-structure order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static VERSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^verse\s*(\d+)?$").expect("verse marker pattern"));
static PRE_CHORUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^pre[\s-]?chorus\s*(\d+)?$").expect("pre-chorus marker pattern"));
static FINAL_CHORUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^final\s+chorus$").expect("final chorus marker pattern"));

/// Structural part of a song
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Intro,
    Verse,
    PreChorus,
    Chorus,
    Bridge,
    FinalChorus,
    Outro,
}

impl SectionKind {
    /// Position in canonical song structure (Intro=1 .. Outro=7)
    pub fn rank(self) -> u8 {
        match self {
            SectionKind::Intro => 1,
            SectionKind::Verse => 2,
            SectionKind::PreChorus => 3,
            SectionKind::Chorus => 4,
            SectionKind::Bridge => 5,
            SectionKind::FinalChorus => 6,
            SectionKind::Outro => 7,
        }
    }

    /// `image_type` value understood by the orchestrator
    pub fn image_type(self) -> &'static str {
        match self {
            SectionKind::Intro => "intro",
            SectionKind::Verse => "verse",
            SectionKind::PreChorus => "pre_chorus",
            SectionKind::Chorus => "chorus",
            SectionKind::Bridge => "bridge",
            SectionKind::FinalChorus => "final_chorus",
            SectionKind::Outro => "outro",
        }
    }

    /// Kinds that are retained at most once per song
    fn is_single_use(self) -> bool {
        matches!(self, SectionKind::PreChorus | SectionKind::Chorus)
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionKind::Intro => write!(f, "Intro"),
            SectionKind::Verse => write!(f, "Verse"),
            SectionKind::PreChorus => write!(f, "Pre-Chorus"),
            SectionKind::Chorus => write!(f, "Chorus"),
            SectionKind::Bridge => write!(f, "Bridge"),
            SectionKind::FinalChorus => write!(f, "Final Chorus"),
            SectionKind::Outro => write!(f, "Outro"),
        }
    }
}

/// One labelled block of lyrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsSection {
    pub kind: SectionKind,
    /// 1-based; distinguishes repeated kinds (Verse 1, Verse 2)
    pub sequence_number: u32,
    /// Non-empty trimmed lyric lines, in source order
    pub text: Vec<String>,
}

impl LyricsSection {
    fn new(kind: SectionKind, sequence_number: u32) -> Self {
        Self {
            kind,
            sequence_number,
            text: Vec::new(),
        }
    }

    /// Display label, e.g. "Verse 2" or "Chorus"
    pub fn label(&self) -> String {
        if self.kind == SectionKind::Verse || self.sequence_number > 1 {
            format!("{} {}", self.kind, self.sequence_number)
        } else {
            self.kind.to_string()
        }
    }

    /// Lines joined with newlines (prompt-generation input)
    pub fn joined_text(&self) -> String {
        self.text.join("\n")
    }
}

/// What happens to lyric lines that follow a skipped repeat of a
/// Chorus or PreChorus marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    /// Append them to whichever section is currently open
    #[default]
    FoldIntoOpen,
    /// Drop them until the next marker
    Discard,
}

/// A recognized section marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub kind: SectionKind,
    /// Explicit number from the marker text (verses only)
    pub number: Option<u32>,
}

/// Strip surrounding brackets, parentheses, colons and whitespace
pub fn normalize_line(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | '(' | ')' | ':'))
}

/// Classify a line as a section marker
///
/// Returns `None` for lyric content.
pub fn classify_marker(line: &str) -> Option<Marker> {
    let normalized = normalize_line(line).to_lowercase();

    let kind = match normalized.as_str() {
        "intro" => SectionKind::Intro,
        "chorus" => SectionKind::Chorus,
        "bridge" => SectionKind::Bridge,
        "outro" => SectionKind::Outro,
        other => {
            if let Some(caps) = VERSE_RE.captures(other) {
                let number = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
                return Some(Marker {
                    kind: SectionKind::Verse,
                    number: number.filter(|n| *n > 0),
                });
            }
            if PRE_CHORUS_RE.is_match(other) {
                SectionKind::PreChorus
            } else if FINAL_CHORUS_RE.is_match(other) {
                SectionKind::FinalChorus
            } else {
                return None;
            }
        }
    };

    Some(Marker { kind, number: None })
}

/// Parse lyrics into sections using [`RepeatPolicy::FoldIntoOpen`]
///
/// An empty result means no lyric lines were found; callers report
/// "no valid sections found" and skip downstream work.
pub fn parse_sections(lyrics: &str) -> Vec<LyricsSection> {
    parse_sections_with(lyrics, RepeatPolicy::default())
}

/// Parse lyrics into sections with an explicit repeat policy
pub fn parse_sections_with(lyrics: &str, policy: RepeatPolicy) -> Vec<LyricsSection> {
    let mut sectioner = Sectioner::new(policy);
    for line in lyrics.lines() {
        sectioner.feed(line);
    }
    sectioner.finish()
}

/// Sort sections into canonical song-structure order
///
/// Ties on kind are broken by sequence number; the sort is stable.
pub fn sort_canonical(sections: &mut [LyricsSection]) {
    sections.sort_by_key(|s| (s.kind.rank(), s.sequence_number));
}

struct Sectioner {
    policy: RepeatPolicy,
    sections: Vec<LyricsSection>,
    current: Option<LyricsSection>,
    /// Next sequence number per repeatable kind
    counters: HashMap<SectionKind, u32>,
    /// Highest verse number seen (explicit or assigned)
    max_verse: u32,
    /// Set while discarding lines after a skipped repeat marker
    discarding: bool,
    opened_single_use: Vec<SectionKind>,
}

impl Sectioner {
    fn new(policy: RepeatPolicy) -> Self {
        Self {
            policy,
            sections: Vec::new(),
            current: None,
            counters: HashMap::new(),
            max_verse: 0,
            discarding: false,
            opened_single_use: Vec::new(),
        }
    }

    fn feed(&mut self, line: &str) {
        if normalize_line(line).is_empty() {
            return;
        }

        match classify_marker(line) {
            Some(marker) => self.open_marker(marker),
            None => self.push_lyric(line.trim()),
        }
    }

    fn open_marker(&mut self, marker: Marker) {
        if marker.kind.is_single_use() {
            if self.opened_single_use.contains(&marker.kind) {
                tracing::trace!(kind = %marker.kind, "Skipping repeated section marker");
                self.discarding = self.policy == RepeatPolicy::Discard;
                return;
            }
            self.opened_single_use.push(marker.kind);
        }

        let sequence = self.next_sequence(marker);
        self.close_current();
        self.current = Some(LyricsSection::new(marker.kind, sequence));
        self.discarding = false;
    }

    fn next_sequence(&mut self, marker: Marker) -> u32 {
        match marker.kind {
            SectionKind::Verse => {
                let number = marker.number.unwrap_or(self.max_verse.saturating_add(1));
                self.max_verse = self.max_verse.max(number);
                number
            }
            SectionKind::PreChorus | SectionKind::Chorus => 1,
            kind => {
                let counter = self.counters.entry(kind).or_insert(0);
                *counter = counter.saturating_add(1);
                *counter
            }
        }
    }

    fn push_lyric(&mut self, line: &str) {
        if self.discarding {
            return;
        }

        let current = self.current.get_or_insert_with(|| {
            // Lyrics before any marker: implicit first verse
            self.max_verse = self.max_verse.saturating_add(1);
            LyricsSection::new(SectionKind::Verse, self.max_verse)
        });
        current.text.push(line.to_string());
    }

    fn close_current(&mut self) {
        if let Some(section) = self.current.take() {
            if !section.text.is_empty() {
                self.sections.push(section);
            }
        }
    }

    fn finish(mut self) -> Vec<LyricsSection> {
        self.close_current();
        self.sections
    }
}
