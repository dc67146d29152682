//! Escape state machine

use super::DISCONNECT_CHAR;

/// Position of the relay relative to a possible escape sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeState {
    /// Ordinary relay mode
    Normal,
    /// The previous byte was `\n` or `\r`; an escape character here starts a
    /// command
    AfterLineBreak,
    /// An escape character was seen at the start of a line and is being held
    PendingEscape,
}

impl Default for EscapeState {
    /// Sessions start as if a line had just ended, so an escape typed as the
    /// very first keystroke is recognised.
    fn default() -> Self {
        EscapeState::AfterLineBreak
    }
}

/// What the relay must do with the byte just read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write the byte
    Forward(u8),
    /// Write the held escape character, then the byte
    ForwardEscaped(u8),
    /// Write nothing
    Hold,
    /// Close the session and stop relaying
    Disconnect,
}

fn is_line_break(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

impl EscapeState {
    /// Transition on `byte`, with `escape` as the escape character.
    pub fn next(self, byte: u8, escape: u8) -> (Action, EscapeState) {
        match self {
            EscapeState::PendingEscape if byte == DISCONNECT_CHAR => {
                (Action::Disconnect, EscapeState::Normal)
            }
            EscapeState::PendingEscape if is_line_break(byte) => {
                (Action::ForwardEscaped(byte), EscapeState::AfterLineBreak)
            }
            EscapeState::PendingEscape => (Action::ForwardEscaped(byte), EscapeState::Normal),
            _ if is_line_break(byte) => (Action::Forward(byte), EscapeState::AfterLineBreak),
            EscapeState::AfterLineBreak if byte == escape => {
                (Action::Hold, EscapeState::PendingEscape)
            }
            EscapeState::AfterLineBreak | EscapeState::Normal => {
                (Action::Forward(byte), EscapeState::Normal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESC: u8 = b'~';

    #[test]
    fn test_initial_state() {
        assert_eq!(EscapeState::default(), EscapeState::AfterLineBreak);
    }

    #[test]
    fn test_line_breaks_from_any_plain_state() {
        for state in [EscapeState::Normal, EscapeState::AfterLineBreak] {
            for byte in [b'\n', b'\r'] {
                assert_eq!(
                    state.next(byte, ESC),
                    (Action::Forward(byte), EscapeState::AfterLineBreak)
                );
            }
        }
    }

    #[test]
    fn test_escape_after_line_break_is_held() {
        assert_eq!(
            EscapeState::AfterLineBreak.next(ESC, ESC),
            (Action::Hold, EscapeState::PendingEscape)
        );
    }

    #[test]
    fn test_escape_mid_line_is_forwarded() {
        assert_eq!(
            EscapeState::Normal.next(ESC, ESC),
            (Action::Forward(ESC), EscapeState::Normal)
        );
    }

    #[test]
    fn test_pending_then_dot_disconnects() {
        let (action, _) = EscapeState::PendingEscape.next(b'.', ESC);
        assert_eq!(action, Action::Disconnect);
    }

    #[test]
    fn test_pending_then_other_releases_escape() {
        assert_eq!(
            EscapeState::PendingEscape.next(b'x', ESC),
            (Action::ForwardEscaped(b'x'), EscapeState::Normal)
        );
    }

    #[test]
    fn test_pending_then_escape_releases_one() {
        assert_eq!(
            EscapeState::PendingEscape.next(ESC, ESC),
            (Action::ForwardEscaped(ESC), EscapeState::Normal)
        );
    }

    #[test]
    fn test_pending_then_line_break() {
        assert_eq!(
            EscapeState::PendingEscape.next(b'\r', ESC),
            (Action::ForwardEscaped(b'\r'), EscapeState::AfterLineBreak)
        );
    }

    #[test]
    fn test_dot_outside_pending_is_data() {
        assert_eq!(
            EscapeState::AfterLineBreak.next(b'.', ESC),
            (Action::Forward(b'.'), EscapeState::Normal)
        );
    }

    #[test]
    fn test_custom_escape_char() {
        assert_eq!(
            EscapeState::AfterLineBreak.next(b'%', b'%'),
            (Action::Hold, EscapeState::PendingEscape)
        );
        assert_eq!(
            EscapeState::AfterLineBreak.next(b'~', b'%'),
            (Action::Forward(b'~'), EscapeState::Normal)
        );
    }
}
