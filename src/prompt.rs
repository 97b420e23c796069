//! Interactive admin password confirmation.
use anyhow::{Context, Result};
use std::io::{self, ErrorKind, Write};

pub const PASSWORD_PROMPT: &str = "admin user password";
pub const CONFIRM_PROMPT: &str = "confirm password";
pub const MIN_PASSWORD_LEN: usize = 4;

/// One secret read from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretInput {
    Entered(String),
    /// The user interrupted the prompt (Ctrl-C or end of input).
    Interrupted,
}

/// Source of non-echoed secrets.
pub trait SecretReader {
    fn read_secret(&mut self, prompt: &str) -> Result<SecretInput>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Accepted(String),
    Cancelled,
}

enum PromptState {
    AwaitPassword,
    AwaitConfirmation(String),
    Accepted(String),
    Cancelled,
}

/// Ask for a password until a confirmed one of sufficient length is entered.
///
/// Short passwords re-prompt immediately; a mismatched confirmation restarts
/// from the first prompt. Interrupting either read cancels the whole prompt.
pub fn confirm_password(reader: &mut dyn SecretReader, out: &mut dyn Write) -> Result<PromptOutcome> {
    let mut state = PromptState::AwaitPassword;
    loop {
        state = match state {
            PromptState::AwaitPassword => match reader.read_secret(PASSWORD_PROMPT)? {
                SecretInput::Interrupted => PromptState::Cancelled,
                SecretInput::Entered(password) if password.chars().count() < MIN_PASSWORD_LEN => {
                    writeln!(out, "At least {MIN_PASSWORD_LEN} characters are required")?;
                    PromptState::AwaitPassword
                }
                SecretInput::Entered(password) => PromptState::AwaitConfirmation(password),
            },
            PromptState::AwaitConfirmation(password) => match reader.read_secret(CONFIRM_PROMPT)? {
                SecretInput::Interrupted => PromptState::Cancelled,
                SecretInput::Entered(confirmation) if confirmation == password => {
                    PromptState::Accepted(password)
                }
                SecretInput::Entered(_) => {
                    writeln!(out, "Passwords do not match")?;
                    PromptState::AwaitPassword
                }
            },
            PromptState::Accepted(password) => return Ok(PromptOutcome::Accepted(password)),
            PromptState::Cancelled => return Ok(PromptOutcome::Cancelled),
        };
    }
}

/// Reads secrets from the terminal on stdin without echo.
///
/// Without a terminal to read from, every prompt counts as interrupted so
/// unattended runs skip the admin account instead of failing.
#[derive(Debug, Default)]
pub struct TerminalSecrets;

impl SecretReader for TerminalSecrets {
    fn read_secret(&mut self, prompt: &str) -> Result<SecretInput> {
        match terminal::read_secret(prompt) {
            Ok(secret) => Ok(SecretInput::Entered(secret)),
            Err(err) => read_error_outcome(err),
        }
    }
}

/// Map a failed secret read to a cancelled prompt or a real error.
fn read_error_outcome(err: io::Error) -> Result<SecretInput> {
    match err.kind() {
        ErrorKind::Interrupted | ErrorKind::UnexpectedEof | ErrorKind::NotConnected => {
            tracing::debug!(error = %err, "password prompt interrupted");
            Ok(SecretInput::Interrupted)
        }
        _ => Err(err).context("read password"),
    }
}

#[cfg(unix)]
mod terminal {
    //! Line reads straight from the stdin file descriptor with echo off.
    //!
    //! A scoped SIGINT handler installed without `SA_RESTART` turns Ctrl-C
    //! into an immediate `Interrupted` error instead of killing the process.
    use std::io::{self, ErrorKind, Write};
    use std::sync::atomic::{AtomicBool, Ordering};

    static INTERRUPTED: AtomicBool = AtomicBool::new(false);

    extern "C" fn record_interrupt(_signal: libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }

    pub(super) fn read_secret(prompt: &str) -> io::Result<String> {
        let fd = libc::STDIN_FILENO;
        // SAFETY: isatty only inspects the descriptor.
        if unsafe { libc::isatty(fd) } != 1 {
            return Err(io::Error::new(
                ErrorKind::NotConnected,
                "stdin is not a terminal",
            ));
        }
        let mut stderr = io::stderr();
        write!(stderr, "{prompt}: ")?;
        stderr.flush()?;

        let line = {
            let _echo = EchoOff::install(fd)?;
            let _sigint = SigintGuard::install()?;
            read_line(fd)
        };
        writeln!(stderr)?;
        let line = line?;
        Ok(String::from_utf8_lossy(&line)
            .trim_end_matches('\r')
            .to_string())
    }

    fn read_line(fd: libc::c_int) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        loop {
            let mut byte = 0u8;
            // SAFETY: reads at most one byte into a live local.
            let n = unsafe { libc::read(fd, (&mut byte as *mut u8).cast(), 1) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == ErrorKind::Interrupted && !INTERRUPTED.load(Ordering::SeqCst) {
                    continue;
                }
                return Err(err);
            }
            if INTERRUPTED.load(Ordering::SeqCst) {
                return Err(ErrorKind::Interrupted.into());
            }
            match (n, byte) {
                (0, _) => return Err(ErrorKind::UnexpectedEof.into()),
                (_, b'\n') => return Ok(line),
                (_, byte) => line.push(byte),
            }
        }
    }

    /// Restores the terminal attributes captured at install on drop.
    struct EchoOff {
        fd: libc::c_int,
        saved: libc::termios,
    }

    impl EchoOff {
        fn install(fd: libc::c_int) -> io::Result<Self> {
            // SAFETY: termios is plain data filled in by tcgetattr before use.
            unsafe {
                let mut saved: libc::termios = std::mem::zeroed();
                if libc::tcgetattr(fd, &mut saved) != 0 {
                    return Err(io::Error::last_os_error());
                }
                let mut quiet = saved;
                quiet.c_lflag &= !libc::ECHO;
                if libc::tcsetattr(fd, libc::TCSAFLUSH, &quiet) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(Self { fd, saved })
            }
        }
    }

    impl Drop for EchoOff {
        fn drop(&mut self) {
            // SAFETY: restores the attributes captured in `install`.
            unsafe {
                libc::tcsetattr(self.fd, libc::TCSAFLUSH, &self.saved);
            }
        }
    }

    struct SigintGuard {
        previous: libc::sigaction,
    }

    impl SigintGuard {
        fn install() -> io::Result<Self> {
            INTERRUPTED.store(false, Ordering::SeqCst);
            // SAFETY: both sigaction structs are fully initialized before use and
            // the handler only touches an atomic.
            unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction =
                    record_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
                libc::sigemptyset(&mut action.sa_mask);
                // No SA_RESTART: the blocked read must see EINTR.
                action.sa_flags = 0;
                let mut previous: libc::sigaction = std::mem::zeroed();
                if libc::sigaction(libc::SIGINT, &action, &mut previous) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(Self { previous })
            }
        }
    }

    impl Drop for SigintGuard {
        fn drop(&mut self) {
            // SAFETY: restores the disposition captured in `install`.
            unsafe {
                libc::sigaction(libc::SIGINT, &self.previous, std::ptr::null_mut());
            }
        }
    }
}

#[cfg(not(unix))]
mod terminal {
    use std::io;

    pub(super) fn read_secret(prompt: &str) -> io::Result<String> {
        dialoguer::Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(|dialoguer::Error::IO(err)| err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedSecrets {
        inputs: VecDeque<SecretInput>,
        prompts: Vec<String>,
    }

    impl ScriptedSecrets {
        fn new(inputs: &[&str]) -> Self {
            Self {
                inputs: inputs
                    .iter()
                    .map(|value| SecretInput::Entered(value.to_string()))
                    .collect(),
                prompts: Vec::new(),
            }
        }

        fn then_interrupt(mut self) -> Self {
            self.inputs.push_back(SecretInput::Interrupted);
            self
        }
    }

    impl SecretReader for ScriptedSecrets {
        fn read_secret(&mut self, prompt: &str) -> Result<SecretInput> {
            self.prompts.push(prompt.to_string());
            Ok(self
                .inputs
                .pop_front()
                .expect("prompt read more inputs than scripted"))
        }
    }

    #[test]
    fn matching_pair_is_accepted() {
        let mut reader = ScriptedSecrets::new(&["goodpw", "goodpw"]);
        let mut out = Vec::new();

        let outcome = confirm_password(&mut reader, &mut out).expect("prompt");

        assert_eq!(outcome, PromptOutcome::Accepted("goodpw".to_string()));
        assert_eq!(reader.prompts, vec![PASSWORD_PROMPT, CONFIRM_PROMPT]);
        assert!(out.is_empty());
    }

    #[test]
    fn short_password_reprompts_without_reading_confirmation() {
        let mut reader = ScriptedSecrets::new(&["ab", "goodpw", "goodpw"]);
        let mut out = Vec::new();

        let outcome = confirm_password(&mut reader, &mut out).expect("prompt");

        assert_eq!(outcome, PromptOutcome::Accepted("goodpw".to_string()));
        assert_eq!(
            reader.prompts,
            vec![PASSWORD_PROMPT, PASSWORD_PROMPT, CONFIRM_PROMPT]
        );
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "At least 4 characters are required\n"
        );
    }

    #[test]
    fn mismatch_restarts_from_first_prompt() {
        let mut reader = ScriptedSecrets::new(&["secret1", "secret2", "goodpw", "goodpw"]);
        let mut out = Vec::new();

        let outcome = confirm_password(&mut reader, &mut out).expect("prompt");

        assert_eq!(outcome, PromptOutcome::Accepted("goodpw".to_string()));
        assert_eq!(
            reader.prompts,
            vec![PASSWORD_PROMPT, CONFIRM_PROMPT, PASSWORD_PROMPT, CONFIRM_PROMPT]
        );
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "Passwords do not match\n"
        );
    }

    #[test]
    fn four_characters_is_long_enough() {
        let mut reader = ScriptedSecrets::new(&["abcd", "abcd"]);
        let mut out = Vec::new();

        let outcome = confirm_password(&mut reader, &mut out).expect("prompt");

        assert_eq!(outcome, PromptOutcome::Accepted("abcd".to_string()));
    }

    #[test]
    fn interrupt_at_first_prompt_cancels() {
        let mut reader = ScriptedSecrets::new(&[]).then_interrupt();
        let mut out = Vec::new();

        let outcome = confirm_password(&mut reader, &mut out).expect("prompt");

        assert_eq!(outcome, PromptOutcome::Cancelled);
        assert_eq!(reader.prompts, vec![PASSWORD_PROMPT]);
    }

    #[test]
    fn interrupt_at_confirmation_cancels() {
        let mut reader = ScriptedSecrets::new(&["goodpw"]).then_interrupt();
        let mut out = Vec::new();

        let outcome = confirm_password(&mut reader, &mut out).expect("prompt");

        assert_eq!(outcome, PromptOutcome::Cancelled);
        assert_eq!(reader.prompts, vec![PASSWORD_PROMPT, CONFIRM_PROMPT]);
    }

    #[test]
    fn missing_terminal_and_end_of_input_cancel_the_prompt() {
        for kind in [
            ErrorKind::NotConnected,
            ErrorKind::UnexpectedEof,
            ErrorKind::Interrupted,
        ] {
            let outcome = read_error_outcome(io::Error::from(kind)).expect("cancelled");
            assert_eq!(outcome, SecretInput::Interrupted, "{kind:?}");
        }
    }

    #[test]
    fn other_read_failures_are_errors() {
        let err = read_error_outcome(io::Error::from(ErrorKind::PermissionDenied))
            .expect_err("real failure");
        assert!(err.to_string().contains("read password"));
    }

    #[cfg(unix)]
    #[test]
    fn terminal_reader_without_tty_cancels() {
        // SAFETY: isatty only inspects the descriptor.
        if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
            return;
        }
        let mut out = Vec::new();

        let outcome = confirm_password(&mut TerminalSecrets, &mut out).expect("prompt");

        assert_eq!(outcome, PromptOutcome::Cancelled);
        assert!(out.is_empty());
    }
}
