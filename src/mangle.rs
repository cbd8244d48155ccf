//! Mangled indirect-call signature strings (`spec.md` §4.4, §6, Glossary).
//!
//! `CallInd`/`CallIndExt` don't carry an argument list inline; the local
//! slot the lifter reads the call target from is typed with a name that
//! encodes one instead, as `A0:(A|S)<n>(A|S)<n>...` — `A0:` is a fixed
//! prefix, then one segment per argument: `A` for an argument-register
//! slot, `S` for a stack-relative slot, each followed by its decimal
//! index. A loader driving a whole module parses this to recover how many
//! arguments an indirect call site passes and where each one lives.

use std::fmt;

use crate::error::MangleError;

/// One argument slot decoded from a mangled signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSlot {
    Register(u32),
    Stack(u32),
}

impl fmt::Display for ArgSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgSlot::Register(n) => write!(f, "A{n}"),
            ArgSlot::Stack(n) => write!(f, "S{n}"),
        }
    }
}

const PREFIX: &str = "A0:";

/// Parses a mangled indirect-call signature into its ordered argument
/// slots.
pub fn parse(signature: &str) -> Result<Vec<ArgSlot>, MangleError> {
    let rest = signature.strip_prefix(PREFIX).ok_or_else(|| MangleError::MissingPrefix(signature.to_string()))?;
    let mut slots = Vec::new();
    let mut chars = rest.chars().peekable();
    while chars.peek().is_some() {
        let tag = chars.next().expect("peek() confirmed a char is available");
        let mut digits = String::new();
        while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
            digits.push(chars.next().expect("peek() confirmed a char is available"));
        }
        if digits.is_empty() {
            return Err(MangleError::MalformedSegment(signature.to_string()));
        }
        let n: u32 = digits.parse().map_err(|_| MangleError::MalformedSegment(signature.to_string()))?;
        let slot = match tag {
            'A' => ArgSlot::Register(n),
            'S' => ArgSlot::Stack(n),
            _ => return Err(MangleError::MalformedSegment(signature.to_string())),
        };
        slots.push(slot);
    }
    Ok(slots)
}

/// Formats argument slots back into a mangled signature string, the
/// inverse of [`parse`].
pub fn format(slots: &[ArgSlot]) -> String {
    let mut s = String::from(PREFIX);
    for slot in slots {
        s.push_str(&slot.to_string());
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_mixed_signature() {
        let sig = "A0:A0S0A1";
        let slots = parse(sig).unwrap();
        assert_eq!(slots, vec![ArgSlot::Register(0), ArgSlot::Stack(0), ArgSlot::Register(1)]);
        assert_eq!(format(&slots), sig);
    }

    #[test]
    fn empty_argument_list_is_just_the_prefix() {
        assert_eq!(parse("A0:").unwrap(), Vec::new());
        assert_eq!(format(&[]), "A0:");
    }

    #[test]
    fn missing_prefix_is_rejected() {
        assert!(parse("A1:A0").is_err());
    }

    #[test]
    fn malformed_segment_is_rejected() {
        assert!(parse("A0:X0").is_err());
        assert!(parse("A0:A").is_err());
    }
}
