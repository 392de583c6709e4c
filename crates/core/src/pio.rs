use crate::error::Error;

/// Default line prefixes used when writing a `.pio` transcript (§6).
/// testlib's own interaction viewers accept arbitrary prefixes declared on
/// the first two lines; these are just this judge's choice of them.
pub const INTERACTOR_PREFIX: &str = ">";
pub const SOLUTION_PREFIX: &str = "<";

/// The three sidecar payloads captured for one Communication testcase
/// (§6 `.pin`/`.pout`/`.pio`).
#[derive(Debug, Clone)]
pub struct Capture {
  /// Raw bytes the interactor wrote to its stdout (`.pin`).
  pub pin: Vec<u8>,

  /// Raw bytes the solution wrote to its stdout (`.pout`).
  pub pout: Vec<u8>,

  /// Merged transcript in the two-prefix format (`.pio`).
  pub pio: Vec<u8>,
}

/// Which side produced one line of a parsed `.pio` transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
  Interactor,
  Solution,
}

/// A parsed `.pio` transcript: its declared prefixes plus the ordered,
/// prefix-stripped payload lines.
#[derive(Debug, Clone)]
pub struct Transcript {
  pub interactor_prefix: String,
  pub solution_prefix: String,
  pub lines: Vec<(Side, String)>,
}

/// Build a `.pio` transcript from the two sides' independently-captured
/// byte streams (§6). The two captures carry no shared ordering
/// information, so lines are interleaved round-robin, one per side per
/// round; this reconstructs the true order for strictly turn-based
/// interactors but not for protocols that batch or pipeline requests.
pub fn merge(pin: &[u8], pout: &[u8]) -> Vec<u8> {
  let interactor_text = String::from_utf8_lossy(pin).into_owned();
  let solution_text = String::from_utf8_lossy(pout).into_owned();
  let interactor_lines: Vec<&str> = interactor_text.lines().collect();
  let solution_lines: Vec<&str> = solution_text.lines().collect();

  let mut out = String::new();
  out.push_str(INTERACTOR_PREFIX);
  out.push('\n');
  out.push_str(SOLUTION_PREFIX);
  out.push('\n');

  let rounds = interactor_lines.len().max(solution_lines.len());
  for i in 0..rounds {
    if let Some(line) = interactor_lines.get(i) {
      out.push_str(INTERACTOR_PREFIX);
      out.push_str(line);
      out.push('\n');
    }
    if let Some(line) = solution_lines.get(i) {
      out.push_str(SOLUTION_PREFIX);
      out.push_str(line);
      out.push('\n');
    }
  }

  out.into_bytes()
}

/// Parse a `.pio` transcript per §6: line 1 declares the interactor
/// prefix, line 2 the solution prefix (may be empty), and every
/// subsequent non-empty line must begin with one of the two.
pub fn parse(bytes: &[u8]) -> Result<Transcript, Error> {
  let text = String::from_utf8_lossy(bytes);
  let mut raw_lines = text.lines();

  let interactor_prefix = raw_lines
    .next()
    .ok_or_else(|| Error::Package("`.pio` transcript is missing its interactor prefix line".to_string()))?
    .to_string();
  let solution_prefix = raw_lines
    .next()
    .ok_or_else(|| Error::Package("`.pio` transcript is missing its solution prefix line".to_string()))?
    .to_string();

  let mut lines = Vec::new();
  for line in raw_lines {
    if line.is_empty() {
      continue;
    }
    if !interactor_prefix.is_empty() && line.starts_with(interactor_prefix.as_str()) {
      lines.push((Side::Interactor, line[interactor_prefix.len()..].to_string()));
    } else if !solution_prefix.is_empty() && line.starts_with(solution_prefix.as_str()) {
      lines.push((Side::Solution, line[solution_prefix.len()..].to_string()));
    } else {
      return Err(Error::Package(format!(
        "`.pio` transcript line does not start with either declared prefix: `{}`",
        line
      )));
    }
  }

  Ok(Transcript {
    interactor_prefix,
    solution_prefix,
    lines,
  })
}
