//! `attest keygen`: create the key pair `generate` and `verify` pick up by default.

use anyhow::Result;

use attest_core::keys::write_key_pair;
use attest_core::{generate_signing_key, key_id};

use crate::cli::args::KeygenArgs;
use crate::exit_codes;

pub fn run(args: KeygenArgs) -> Result<i32> {
    let signing_key = generate_signing_key();
    let files = write_key_pair(&args.out, &signing_key, args.force)?;

    println!("Signing key:   {}", files.private_path.display());
    println!("Verifying key: {}", files.public_path.display());
    println!("Key id:        {}", key_id(&signing_key.verifying_key())?);
    println!();
    println!("Keep the signing key secret. Commit or distribute the verifying key.");

    Ok(exit_codes::SUCCESS)
}
