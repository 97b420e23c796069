//! Ordered step execution with dot progress.
//!
//! The sequencer knows nothing about which steps run; callers build the list.
//! A failure is returned exactly as the step raised it, after a line break so
//! the message does not land on the same line as the progress dots.
use anyhow::Result;
use std::io::Write;

/// A single provisioning action run against a context `C`.
pub trait Step<C: ?Sized> {
    fn label(&self) -> String;
    fn execute(&self, ctx: &C) -> Result<()>;
}

/// Write `header`, run every step in order, and end the phase with a newline.
pub fn run_phase<C, S>(out: &mut dyn Write, header: &str, ctx: &C, steps: &[S]) -> Result<()>
where
    C: ?Sized,
    S: Step<C>,
{
    write!(out, "{header}")?;
    out.flush()?;
    run_steps(out, ctx, steps)
}

/// Run `steps` in order, writing one `.` after each success.
pub fn run_steps<C, S>(out: &mut dyn Write, ctx: &C, steps: &[S]) -> Result<()>
where
    C: ?Sized,
    S: Step<C>,
{
    for (index, step) in steps.iter().enumerate() {
        tracing::debug!(step = %step.label(), index, total = steps.len(), "running step");
        if let Err(err) = step.execute(ctx) {
            // The step error takes precedence over output errors.
            let _ = writeln!(out);
            let _ = out.flush();
            return Err(err);
        }
        write!(out, ".")?;
        out.flush()?;
    }
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
