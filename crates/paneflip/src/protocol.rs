//! Line-oriented command protocol.
//!
//! One command per line:
//!
//! ```text
//! <target>: <ACTION> <arg> <arg> ...
//! ```
//!
//! The target is everything before the first `:` and must not be empty.
//! The action and its arguments are separated by runs of ASCII whitespace.
//! Parsing happens in two stages: [`parse_line`] splits a line into a
//! borrowed [`Command`], and [`Request::from_command`] checks the action and
//! its arguments and produces a typed [`Request`].
//!
//! Numeric arguments follow C `strtol` base-0 rules: `0x` prefix for hex, a
//! leading `0` for octal, decimal otherwise, optional sign.

use std::fmt;
use std::num::IntErrorKind;
use std::path::Path;

use paneflip_canvas::{Bezier2, Circle, Color, Line, Rect, RectCopy, Triangle};

/// Longest accepted line in bytes, newline excluded.
pub const MAX_LINE_LEN: usize = 1024;

// ── Stage 1: syntax ──────────────────────────────────────────────────────

/// A syntactically valid command, borrowing from the input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    pub target: &'a str,
    pub action: &'a str,
    pub args: Vec<&'a str>,
}

/// Syntax errors. Replied to as `parsing failed: <message>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// No `:`, or nothing before it.
    TargetMissing,
    /// Nothing but whitespace after the `:`.
    ActionMissing,
    /// The line is longer than [`MAX_LINE_LEN`].
    TooLong,
    /// The line is not UTF-8.
    InvalidUtf8,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetMissing => f.write_str("target name must be provided."),
            Self::ActionMissing => f.write_str("action required"),
            Self::TooLong => write!(f, "line exceeds {MAX_LINE_LEN} bytes"),
            Self::InvalidUtf8 => f.write_str("line is not valid UTF-8"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Split one line into target, action and arguments.
///
/// A trailing newline is allowed and ignored.
pub fn parse_line(line: &str) -> Result<Command<'_>, ParseError> {
    let (target, rest) = line.split_once(':').ok_or(ParseError::TargetMissing)?;
    if target.is_empty() {
        return Err(ParseError::TargetMissing);
    }
    let mut words = rest.split_ascii_whitespace();
    let action = words.next().ok_or(ParseError::ActionMissing)?;
    Ok(Command {
        target,
        action,
        args: words.collect(),
    })
}

// ── Stage 2: semantics ───────────────────────────────────────────────────

/// A validated operation on the command's target pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    Create { color: Color },
    Remove,
    Fill { color: Color },
    Rect { rect: Rect, color: Color },
    Circle { circle: Circle, color: Color },
    Line { line: Line, color: Color },
    Triangle { tri: Triangle, color: Color },
    Bezier { curve: Bezier2, color: Color },
    Copy(RectCopy),
    Dump { path: &'a Path },
}

/// Argument errors. Replied to as `failure: <message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    UnknownAction(String),
    /// Wrong number of arguments; carries the usage line.
    Arity(&'static str),
    /// Argument `index` (0-based) is not a `#RRGGBB` color.
    BadColor { index: usize },
    /// Argument `index` (0-based) does not parse as an integer.
    NotANumber { index: usize, name: &'static str },
    /// Argument `index` (0-based) does not fit its coordinate type.
    OutOfRange { index: usize, name: &'static str },
}

fn ordinal(index: usize) -> &'static str {
    const WORDS: [&str; 8] = [
        "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth",
    ];
    WORDS.get(index).copied().unwrap_or("trailing")
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAction(action) => write!(f, "no such action found: {action}"),
            Self::Arity(usage) => f.write_str(usage),
            Self::BadColor { index } => write!(f, "{} argument is not a color.", ordinal(*index)),
            Self::NotANumber { index, name } => {
                write!(f, "{} argument ({name}) is not a number.", ordinal(*index))
            }
            Self::OutOfRange { index, name } => {
                write!(f, "{} argument ({name}) is out of range.", ordinal(*index))
            }
        }
    }
}

impl std::error::Error for RequestError {}

/// Why a string is not a `strtol`-style integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberError {
    Invalid,
    OutOfRange,
}

/// Parse an integer the way `strtol(s, &end, 0)` does, requiring the whole
/// string to be consumed.
pub fn parse_c_integer(s: &str) -> Result<i64, NumberError> {
    let (negative, unsigned) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
        .filter(|h| !h.is_empty())
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };
    // from_str_radix would accept a second sign.
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(NumberError::Invalid);
    }
    let magnitude = i64::from_str_radix(digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => NumberError::OutOfRange,
        _ => NumberError::Invalid,
    })?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Cursor over a command's arguments that tracks positions for errors.
struct Args<'c, 'a> {
    args: &'c [&'a str],
}

impl<'a> Args<'_, 'a> {
    fn color(&self, index: usize) -> Result<Color, RequestError> {
        self.args[index]
            .parse()
            .map_err(|_| RequestError::BadColor { index })
    }

    fn int<T: TryFrom<i64>>(&self, index: usize, name: &'static str) -> Result<T, RequestError> {
        let value = parse_c_integer(self.args[index]).map_err(|e| match e {
            NumberError::Invalid => RequestError::NotANumber { index, name },
            NumberError::OutOfRange => RequestError::OutOfRange { index, name },
        })?;
        T::try_from(value).map_err(|_| RequestError::OutOfRange { index, name })
    }

    fn str(&self, index: usize) -> &'a str {
        self.args[index]
    }
}

/// Actions, their argument counts and usage lines.
const ACTIONS: &[(&str, usize, &str)] = &[
    ("CREATE", 1, "CREATE requires exactly one argument"),
    ("REMOVE", 0, "REMOVE requires no arguments."),
    ("FILL", 1, "FILL requires args color."),
    ("RECT", 5, "RECT requires args color x y w h."),
    ("CIRCLE", 4, "CIRCLE requires args color x y r."),
    ("LINE", 5, "LINE requires args color x0 y0 x1 y1."),
    ("TRIANGLE", 7, "TRIANGLE requires args color x0 y0 x1 y1 x2 y2."),
    ("BEZIER", 7, "BEZIER requires args color x0 y0 x1 y1 x2 y2."),
    ("COPY", 6, "COPY requires args dst_x dst_y src_x src_y w h."),
    ("DUMP", 1, "DUMP requires args path."),
];

impl<'a> Request<'a> {
    /// Check the action name and arguments of `cmd`.
    pub fn from_command(cmd: &Command<'a>) -> Result<Self, RequestError> {
        let &(action, arity, usage) = ACTIONS
            .iter()
            .find(|(name, _, _)| *name == cmd.action)
            .ok_or_else(|| RequestError::UnknownAction(cmd.action.to_owned()))?;
        if cmd.args.len() != arity {
            return Err(RequestError::Arity(usage));
        }
        let a = Args { args: &cmd.args };

        let request = match action {
            "CREATE" => Self::Create { color: a.color(0)? },
            "REMOVE" => Self::Remove,
            "FILL" => Self::Fill { color: a.color(0)? },
            "RECT" => Self::Rect {
                color: a.color(0)?,
                rect: Rect::new(a.int(1, "x")?, a.int(2, "y")?, a.int(3, "w")?, a.int(4, "h")?),
            },
            "CIRCLE" => Self::Circle {
                color: a.color(0)?,
                circle: Circle::new(a.int(1, "x")?, a.int(2, "y")?, a.int(3, "r")?),
            },
            "LINE" => Self::Line {
                color: a.color(0)?,
                line: Line::new(
                    a.int(1, "x0")?,
                    a.int(2, "y0")?,
                    a.int(3, "x1")?,
                    a.int(4, "y1")?,
                ),
            },
            "TRIANGLE" => Self::Triangle {
                color: a.color(0)?,
                tri: Triangle::new(
                    (a.int(1, "x0")?, a.int(2, "y0")?),
                    (a.int(3, "x1")?, a.int(4, "y1")?),
                    (a.int(5, "x2")?, a.int(6, "y2")?),
                ),
            },
            "BEZIER" => Self::Bezier {
                color: a.color(0)?,
                curve: Bezier2::new(
                    (a.int(1, "x0")?, a.int(2, "y0")?),
                    (a.int(3, "x1")?, a.int(4, "y1")?),
                    (a.int(5, "x2")?, a.int(6, "y2")?),
                ),
            },
            "COPY" => Self::Copy(RectCopy {
                dst_x: a.int(0, "dst_x")?,
                dst_y: a.int(1, "dst_y")?,
                src_x: a.int(2, "src_x")?,
                src_y: a.int(3, "src_y")?,
                w: a.int(4, "w")?,
                h: a.int(5, "h")?,
            }),
            _ => Self::Dump {
                path: Path::new(a.str(0)),
            },
        };
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(line: &str) -> Result<Request<'_>, RequestError> {
        Request::from_command(&parse_line(line).unwrap())
    }

    // ── parse_line ───────────────────────────────────────────────────

    #[test]
    fn parses_rect_command() {
        let cmd = parse_line("main: RECT #112233 1 2 3 4").unwrap();
        assert_eq!(cmd.target, "main");
        assert_eq!(cmd.action, "RECT");
        assert_eq!(cmd.args, ["#112233", "1", "2", "3", "4"]);
    }

    #[test]
    fn missing_colon_is_target_missing() {
        assert_eq!(parse_line("main RECT"), Err(ParseError::TargetMissing));
        assert_eq!(parse_line(""), Err(ParseError::TargetMissing));
        assert_eq!(parse_line(": CREATE #000000"), Err(ParseError::TargetMissing));
    }

    #[test]
    fn missing_action() {
        assert_eq!(parse_line("main:"), Err(ParseError::ActionMissing));
        assert_eq!(parse_line("main:  \t \n"), Err(ParseError::ActionMissing));
    }

    #[test]
    fn whitespace_runs_and_newline_are_separators() {
        let cmd = parse_line("a:\tCIRCLE   #ffffff\t1  2 3\r\n").unwrap();
        assert_eq!(cmd.action, "CIRCLE");
        assert_eq!(cmd.args, ["#ffffff", "1", "2", "3"]);
    }

    #[test]
    fn target_stops_at_first_colon() {
        let cmd = parse_line("pane: DUMP /tmp/x:y").unwrap();
        assert_eq!(cmd.target, "pane");
        assert_eq!(cmd.args, ["/tmp/x:y"]);
    }

    #[test]
    fn parse_error_messages() {
        assert_eq!(
            ParseError::TargetMissing.to_string(),
            "target name must be provided."
        );
        assert_eq!(ParseError::ActionMissing.to_string(), "action required");
    }

    // ── strtol rules ─────────────────────────────────────────────────

    #[test]
    fn c_integer_bases() {
        assert_eq!(parse_c_integer("42"), Ok(42));
        assert_eq!(parse_c_integer("0x1F"), Ok(31));
        assert_eq!(parse_c_integer("0X10"), Ok(16));
        assert_eq!(parse_c_integer("010"), Ok(8));
        assert_eq!(parse_c_integer("0"), Ok(0));
        assert_eq!(parse_c_integer("-7"), Ok(-7));
        assert_eq!(parse_c_integer("+7"), Ok(7));
        assert_eq!(parse_c_integer("-0x10"), Ok(-16));
    }

    #[test]
    fn c_integer_rejects_partial_input() {
        for bad in ["", "x", "12a", "0x", "08", "--1", "+-1", "1.5", " 1"] {
            assert_eq!(parse_c_integer(bad), Err(NumberError::Invalid), "{bad:?}");
        }
        assert_eq!(
            parse_c_integer("99999999999999999999"),
            Err(NumberError::OutOfRange)
        );
    }

    // ── Request::from_command ────────────────────────────────────────

    #[test]
    fn create_and_remove() {
        assert_eq!(
            request("p: CREATE #ff0000").unwrap(),
            Request::Create {
                color: Color::rgb(0xFF, 0, 0)
            }
        );
        assert_eq!(request("p: REMOVE").unwrap(), Request::Remove);
    }

    #[test]
    fn rect_with_mixed_bases() {
        assert_eq!(
            request("p: RECT #112233 0x10 010 3 4").unwrap(),
            Request::Rect {
                rect: Rect::new(16, 8, 3, 4),
                color: Color::rgb(0x11, 0x22, 0x33),
            }
        );
    }

    #[test]
    fn circle_and_bezier_accept_their_ranges() {
        assert_eq!(
            request("p: CIRCLE #000000 50 50 10").unwrap(),
            Request::Circle {
                circle: Circle::new(50, 50, 10),
                color: Color::BLACK,
            }
        );
        assert_eq!(
            request("p: BEZIER #000000 -100 0 50 -70000 200 10").unwrap(),
            Request::Bezier {
                curve: Bezier2::new((-100, 0), (50, -70000), (200, 10)),
                color: Color::BLACK,
            }
        );
    }

    #[test]
    fn unknown_action_is_named() {
        let err = request("p: SQUARE 1").unwrap_err();
        assert_eq!(err.to_string(), "no such action found: SQUARE");
        // Actions are case sensitive.
        assert!(matches!(request("p: rect"), Err(RequestError::UnknownAction(_))));
    }

    #[test]
    fn wrong_arity_reports_usage() {
        assert_eq!(
            request("p: CREATE").unwrap_err().to_string(),
            "CREATE requires exactly one argument"
        );
        assert_eq!(
            request("p: REMOVE now").unwrap_err().to_string(),
            "REMOVE requires no arguments."
        );
        assert_eq!(
            request("p: RECT #000000 1 2 3").unwrap_err().to_string(),
            "RECT requires args color x y w h."
        );
    }

    #[test]
    fn argument_errors_name_the_position() {
        assert_eq!(
            request("p: RECT blue 1 2 3 4").unwrap_err().to_string(),
            "first argument is not a color."
        );
        assert_eq!(
            request("p: RECT #000000 1 y 3 4").unwrap_err().to_string(),
            "third argument (y) is not a number."
        );
        assert_eq!(
            request("p: CIRCLE #000000 1 2 -1").unwrap_err().to_string(),
            "fourth argument (r) is out of range."
        );
        assert_eq!(
            request("p: RECT #000000 65536 0 1 1").unwrap_err(),
            RequestError::OutOfRange { index: 1, name: "x" }
        );
    }

    #[test]
    fn copy_and_dump() {
        assert_eq!(
            request("p: COPY 1 2 3 4 5 6").unwrap(),
            Request::Copy(RectCopy {
                dst_x: 1,
                dst_y: 2,
                src_x: 3,
                src_y: 4,
                w: 5,
                h: 6,
            })
        );
        assert_eq!(
            request("p: DUMP out.rgba").unwrap(),
            Request::Dump {
                path: Path::new("out.rgba")
            }
        );
    }
}
