//! Manual VNC server configuration gate.
//!
//! TightVNC on Windows is configured through its tray GUI, which cannot be
//! automated. The launcher prints the steps and waits for the operator.

use std::io::{self, BufRead, Write};

use crate::platform::Platform;

/// Print the TightVNC steps and block until the operator presses Enter.
///
/// Returns `true` if the prompt was shown. On Unix nothing is printed and
/// the input is never read. EOF on `input` counts as confirmation.
pub fn confirm_manual_setup<R: BufRead, W: Write>(
    platform: Platform,
    vnc_port: u16,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    if !platform.is_windows() {
        return Ok(false);
    }

    writeln!(output)?;
    writeln!(output, "Please configure TightVNC with these settings:")?;
    writeln!(output, "1. Right-click TightVNC icon in system tray")?;
    writeln!(output, "2. Click 'Configuration'")?;
    writeln!(output, "3. In 'Server' tab:")?;
    writeln!(output, "   - Check 'Accept incoming connections'")?;
    writeln!(output, "   - Set 'Main server port' to {vnc_port}")?;
    writeln!(output, "   - Uncheck 'Require VNC authentication'")?;
    writeln!(output, "4. Click OK")?;
    writeln!(output)?;
    write!(output, "Press Enter after configuring TightVNC...")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(true)
}

/// Reminder printed once the access URLs are known.
pub fn print_reminders<W: Write>(vnc_port: u16, output: &mut W) -> io::Result<()> {
    writeln!(output)?;
    writeln!(output, "Make sure in TightVNC:")?;
    writeln!(output, "1. 'Accept incoming connections' is checked")?;
    writeln!(output, "2. 'Main server port' is set to {vnc_port}")?;
    writeln!(output, "3. Authentication is disabled or you know the password")
}
