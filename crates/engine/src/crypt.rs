//! The encryption oracle used for `encrypted_` source files.

use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

/// Encrypts and decrypts source file contents.
///
/// The engine treats the implementation as an opaque oracle: `encrypted_`
/// source bytes pass through [`decrypt`](Self::decrypt) before anything else
/// looks at them. `filename_hint` names temporary files so external tools
/// that key behaviour off extensions keep working.
pub trait Encryption {
    /// Encrypts `plaintext`.
    fn encrypt(&self, filename_hint: &str, plaintext: &[u8]) -> io::Result<Vec<u8>>;

    /// Decrypts `ciphertext`.
    fn decrypt(&self, filename_hint: &str, ciphertext: &[u8]) -> io::Result<Vec<u8>>;
}

/// [`Encryption`] backed by the `gpg` command-line tool.
///
/// Plaintext and ciphertext are staged in a private temporary directory that
/// is removed when the call returns; stdio is inherited so pinentry prompts
/// reach the user.
#[derive(Clone, Debug, Default)]
pub struct GpgEncryption {
    /// Recipient for asymmetric encryption. Ignored when `symmetric` is set.
    pub recipient: Option<String>,
    /// Use symmetric encryption instead of public-key encryption.
    pub symmetric: bool,
}

impl GpgEncryption {
    fn run(command: &mut Command) -> io::Result<()> {
        let status = command.status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("gpg failed: {status}")))
        }
    }

    fn hint_base(filename_hint: &str) -> &str {
        Path::new(filename_hint)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("contents")
    }
}

impl Encryption for GpgEncryption {
    fn encrypt(&self, filename_hint: &str, plaintext: &[u8]) -> io::Result<Vec<u8>> {
        let scratch = tempfile::Builder::new().prefix("dotsync-encrypt").tempdir()?;
        let base = Self::hint_base(filename_hint);
        let input = scratch.path().join(base);
        let output = scratch.path().join(format!("{base}.gpg"));
        write_private(&input, plaintext)?;

        let mut command = Command::new("gpg");
        command.args(["--armor", "--quiet", "--output"]).arg(&output);
        if self.symmetric {
            command.arg("--symmetric");
        } else {
            if let Some(recipient) = &self.recipient {
                command.args(["--recipient", recipient]);
            }
            command.arg("--encrypt");
        }
        command.arg(&input);
        Self::run(&mut command)?;
        fs::read(&output)
    }

    fn decrypt(&self, filename_hint: &str, ciphertext: &[u8]) -> io::Result<Vec<u8>> {
        let scratch = tempfile::Builder::new().prefix("dotsync-decrypt").tempdir()?;
        let base = Self::hint_base(filename_hint);
        let output = scratch.path().join(base);
        let input = scratch.path().join(format!("{base}.gpg"));
        write_private(&input, ciphertext)?;

        let mut command = Command::new("gpg");
        command
            .args(["--quiet", "--output"])
            .arg(&output)
            .arg("--decrypt")
            .arg(&input);
        Self::run(&mut command)?;
        fs::read(&output)
    }
}

fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    fs::write(path, data)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
