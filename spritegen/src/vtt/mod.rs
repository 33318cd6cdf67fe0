use std::fmt;
use std::io::Write;

use crate::clock::Span;
use crate::data::{Dim, Pos, Viewport};
use crate::SpriteError;

pub const HEADER: &str = "WEBVTT";
const ARROW: &str = "-->";
const XYWH: &str = "#xywh=";

// HH:MM:SS.mmm ; hours keep growing past 99 rather than wrapping
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let mins = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;
    format!("{hours:02}:{mins:02}:{secs:02}.{millis:03}")
}

// Accepts HH:MM:SS.mmm and the short MM:SS.mmm form
pub fn parse_timestamp(s: &str) -> Option<u64> {
    let (clock, millis) = s.split_once('.')?;
    if millis.len() != 3 {
        return None;
    }
    let millis: u64 = parse_digits(millis)?;
    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, mins, secs) = match parts.as_slice() {
        [h, m, s] => (parse_digits(h)?, parse_digits(m)?, parse_digits(s)?),
        [m, s] => (0, parse_digits(m)?, parse_digits(s)?),
        _ => return None,
    };
    if mins > 59 || secs > 59 {
        return None;
    }
    hours
        .checked_mul(60)?
        .checked_add(mins)?
        .checked_mul(60)?
        .checked_add(secs)?
        .checked_mul(1000)?
        .checked_add(millis)
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

// One thumbnail cue: a time range pointing at a rectangle of a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub span: Span,
    pub sheet: String,
    pub rect: Viewport,
}

impl Cue {
    pub fn fragment(&self) -> String {
        let Viewport { ul, dim } = self.rect;
        format!(
            "{}{XYWH}{},{},{},{}",
            self.sheet, ul.x, ul.y, dim.width, dim.height
        )
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {ARROW} {}",
            format_timestamp(self.span.start_ms),
            format_timestamp(self.span.end_ms)
        )?;
        writeln!(f, "{}", self.fragment())?;
        writeln!(f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueTrack {
    cues: Vec<Cue>,
}

impl CueTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn append(&mut self, cues: Vec<Cue>) {
        self.cues.extend(cues);
    }

    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), SpriteError> {
        writer.write_all(self.render().as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn parse(text: &str) -> Result<Self, SpriteError> {
        let malformed = |line: usize, reason: &str| SpriteError::MalformedTrack {
            line,
            reason: reason.to_string(),
        };
        let mut lines = text.lines().enumerate().map(|(n, l)| (n + 1, l));
        match lines.next() {
            Some((_, first)) if first.trim_start_matches('\u{feff}').starts_with(HEADER) => {}
            _ => return Err(malformed(1, "missing WEBVTT header")),
        }

        let mut cues = Vec::new();
        let mut block: Vec<(usize, &str)> = Vec::new();
        for (n, line) in lines.chain(std::iter::once((0, ""))) {
            if !line.trim().is_empty() {
                block.push((n, line));
                continue;
            }
            if block.is_empty() {
                continue;
            }
            if let Some(cue) = Self::parse_block(&block)? {
                cues.push(cue);
            }
            block.clear();
        }
        Ok(Self { cues })
    }

    fn parse_block(block: &[(usize, &str)]) -> Result<Option<Cue>, SpriteError> {
        let (first_n, first) = block[0];
        if first.starts_with("NOTE") || first.starts_with("STYLE") || first.starts_with("REGION") {
            return Ok(None);
        }
        // an optional cue identifier precedes the timing line
        let rest = if first.contains(ARROW) {
            block
        } else {
            &block[1..]
        };
        let [(timing_n, timing), (payload_n, payload), ..] = rest else {
            return Err(SpriteError::MalformedTrack {
                line: first_n,
                reason: String::from("cue needs a timing line and a payload"),
            });
        };
        let span = parse_timing(timing).ok_or_else(|| SpriteError::MalformedTrack {
            line: *timing_n,
            reason: format!("bad cue timing {timing:?}"),
        })?;
        let (sheet, rect) = parse_fragment(payload).ok_or_else(|| SpriteError::MalformedTrack {
            line: *payload_n,
            reason: format!("bad media fragment {payload:?}"),
        })?;
        Ok(Some(Cue { span, sheet, rect }))
    }
}

impl fmt::Display for CueTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{HEADER}")?;
        writeln!(f)?;
        for cue in self.cues.iter() {
            write!(f, "{cue}")?;
        }
        Ok(())
    }
}

fn parse_timing(line: &str) -> Option<Span> {
    let (start, tail) = line.split_once(ARROW)?;
    // cue settings may trail the end time
    let end = tail.split_whitespace().next()?;
    let start_ms = parse_timestamp(start.trim())?;
    let end_ms = parse_timestamp(end)?;
    if end_ms <= start_ms {
        return None;
    }
    Some(Span { start_ms, end_ms })
}

fn parse_fragment(line: &str) -> Option<(String, Viewport)> {
    let (sheet, xywh) = line.trim().rsplit_once(XYWH)?;
    if sheet.is_empty() {
        return None;
    }
    let nums: Vec<u32> = xywh
        .split(',')
        .map(|n| n.trim().parse::<u32>().ok())
        .collect::<Option<_>>()?;
    let [x, y, width, height] = nums.as_slice() else {
        return None;
    };
    let rect = Viewport {
        ul: Pos { x: *x, y: *y },
        dim: Dim {
            width: *width,
            height: *height,
        },
    };
    Some((sheet.to_string(), rect))
}

#[cfg(test)]
mod test {
    use super::*;

    fn cue(start_ms: u64, end_ms: u64, sheet: &str, x: u32, y: u32) -> Cue {
        Cue {
            span: Span { start_ms, end_ms },
            sheet: sheet.to_string(),
            rect: Viewport {
                ul: Pos { x, y },
                dim: Dim {
                    width: 426,
                    height: 240,
                },
            },
        }
    }

    #[test]
    fn timestamps() {
        assert_eq!(format_timestamp(0), "00:00:00.000");
        assert_eq!(format_timestamp(65_000), "00:01:05.000");
        assert_eq!(format_timestamp(3_723_004), "01:02:03.004");
        assert_eq!(format_timestamp(360_000_000), "100:00:00.000");
        assert_eq!(parse_timestamp("01:02:03.004"), Some(3_723_004));
        assert_eq!(parse_timestamp("01:05.250"), Some(65_250));
        assert_eq!(parse_timestamp("00:61:00.000"), None);
        assert_eq!(parse_timestamp("00:00:01.5"), None);
        assert_eq!(parse_timestamp("aa:00:01.500"), None);
        assert_eq!(parse_timestamp("99999999999999999:00:00.000"), None);
    }

    #[test]
    fn render_track() {
        let mut track = CueTrack::new();
        track.append(vec![
            cue(0, 5000, "60.png", 0, 0),
            cue(5000, 10_000, "60.png", 426, 0),
        ]);
        let expect = "WEBVTT\n\n\
            00:00:00.000 --> 00:00:05.000\n60.png#xywh=0,0,426,240\n\n\
            00:00:05.000 --> 00:00:10.000\n60.png#xywh=426,0,426,240\n\n";
        assert_eq!(track.render(), expect);

        let mut out = Vec::new();
        track.write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), expect);
    }

    #[test]
    fn empty_track_is_just_header() {
        assert_eq!(CueTrack::new().render(), "WEBVTT\n\n");
    }

    #[test]
    fn parse_rendered_track() {
        let mut track = CueTrack::new();
        track.append(vec![
            cue(55_000, 60_000, "60.png", 852, 720),
            cue(60_000, 65_000, "65.png", 0, 0),
        ]);
        let parsed = CueTrack::parse(&track.render()).unwrap();
        assert_eq!(parsed, track);
    }

    #[test]
    fn parse_tolerates_ids_notes_and_settings() {
        let text = "\u{feff}WEBVTT - thumbnails\r\n\r\nNOTE made by hand\r\n\r\n\
            1\r\n00:05.000 --> 00:10.000 align:start\r\nsprites/10.png#xywh=1,2,3,4\r\n";
        let parsed = CueTrack::parse(text).unwrap();
        assert_eq!(parsed.len(), 1);
        let c = &parsed.cues()[0];
        assert_eq!(c.span, Span { start_ms: 5000, end_ms: 10_000 });
        assert_eq!(c.sheet, "sprites/10.png");
        assert_eq!(c.rect.ul, Pos { x: 1, y: 2 });
        assert_eq!(c.rect.dim, Dim { width: 3, height: 4 });
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            CueTrack::parse("00:00:00.000 --> 00:00:05.000\n"),
            Err(SpriteError::MalformedTrack { line: 1, .. })
        ));
        let bad_timing = "WEBVTT\n\n00:00:05.000 --> 00:00:05.000\na.png#xywh=0,0,1,1\n";
        assert!(matches!(
            CueTrack::parse(bad_timing),
            Err(SpriteError::MalformedTrack { line: 3, .. })
        ));
        let bad_fragment = "WEBVTT\n\n00:00:00.000 --> 00:00:05.000\na.png#xywh=0,0,1\n";
        assert!(matches!(
            CueTrack::parse(bad_fragment),
            Err(SpriteError::MalformedTrack { line: 4, .. })
        ));
        let no_payload = "WEBVTT\n\n00:00:00.000 --> 00:00:05.000\n";
        assert!(CueTrack::parse(no_payload).is_err());
        let huge_hours = "WEBVTT\n\n99999999999999999:00:00.000 --> 99999999999999999:00:05.000\na.png#xywh=0,0,1,1\n";
        assert!(matches!(
            CueTrack::parse(huge_hours),
            Err(SpriteError::MalformedTrack { line: 3, .. })
        ));
    }
}
