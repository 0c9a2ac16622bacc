//! The `7zip` coder adapter: shells out to an external `7z`-compatible
//! executable over piped stdin/stdout, reading `SEVEN_ZIP_PATH` to locate
//! it (`spec.md` §6). Ignored entirely by the `native` adapter.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::{CodecError, Coder};

pub struct ExternalProcess7z {
    binary: PathBuf,
}

impl ExternalProcess7z {
    pub fn new() -> Self {
        let binary = std::env::var_os("SEVEN_ZIP_PATH").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("7z"));
        Self { binary }
    }

    fn run(&self, args: &[&str], input: &[u8]) -> Result<Vec<u8>, CodecError> {
        tracing::debug!(binary = %self.binary.display(), ?args, input_bytes = input.len(), "spawning external coder process");
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CodecError(format!("spawn {:?}: {e}", self.binary)))?;

        let mut stdin = child.stdin.take().expect("piped stdin");
        let owned_input = input.to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&owned_input));

        let mut stdout = Vec::new();
        child
            .stdout
            .take()
            .expect("piped stdout")
            .read_to_end(&mut stdout)
            .map_err(|e| CodecError(format!("read 7z stdout: {e}")))?;

        writer
            .join()
            .map_err(|_| CodecError("7z stdin writer thread panicked".into()))?
            .map_err(|e| CodecError(format!("write 7z stdin: {e}")))?;

        let status = child.wait().map_err(|e| CodecError(format!("wait on 7z: {e}")))?;
        if !status.success() {
            return Err(CodecError(format!("7z exited with {status}")));
        }
        Ok(stdout)
    }
}

impl Default for ExternalProcess7z {
    fn default() -> Self {
        Self::new()
    }
}

impl Coder for ExternalProcess7z {
    fn encode(&self, bytes: &[u8], dict_size: u32, _threads: u32) -> Result<Vec<u8>, CodecError> {
        let dict_arg = format!("-m0=lzma2:d={dict_size}");
        self.run(&["a", "dummy.xz", "-txz", "-si", "-so", &dict_arg], bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.run(&["e", "dummy.xz", "-txz", "-si", "-so"], bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_path_defaults_to_bare_name_without_env() {
        std::env::remove_var("SEVEN_ZIP_PATH");
        let adapter = ExternalProcess7z::new();
        assert_eq!(adapter.binary, PathBuf::from("7z"));
    }

    #[test]
    fn binary_path_honors_env_override() {
        std::env::set_var("SEVEN_ZIP_PATH", "/opt/7zz");
        let adapter = ExternalProcess7z::new();
        assert_eq!(adapter.binary, PathBuf::from("/opt/7zz"));
        std::env::remove_var("SEVEN_ZIP_PATH");
    }
}
