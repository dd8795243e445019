//! Attrvault CLI - attribute-level encryption from the command line
//!
//! This is the command-line interface for Attrvault. It wraps the core
//! engine so field triples can be produced and inspected outside an
//! application, e.g. for debugging stored rows or migrating data.

use std::fs;
use std::io::{self, IsTerminal, Read};

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use attrvault_core::{
    cipher, AttributeConfig, AttributeCoordinator, EncryptedField, KeySource, Mode, Value, VERSION,
};

/// Attrvault - attribute-level encryption from the command line
#[derive(Parser)]
#[command(name = "attrvault")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Hex-encoded encryption key
    #[arg(short, long, global = true, env = "ATTRVAULT_KEY")]
    key: Option<String>,

    /// Read the hex-encoded key from a file instead
    #[arg(long, global = true, value_name = "PATH")]
    key_file: Option<String>,

    #[command(subcommand)]
    command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random encryption key
    Keygen {
        /// Key length in bytes
        #[arg(long, default_value_t = 32)]
        bytes: usize,
    },

    /// Encrypt a value into a field triple
    Encrypt {
        /// Plaintext value (reads stdin when omitted)
        #[arg(value_name = "VALUE")]
        value: Option<String>,

        /// Attribute name (drives the slot names in the output)
        #[arg(short, long, default_value = "value")]
        attribute: String,

        /// Encryption mode
        #[arg(long, value_enum, default_value_t = ModeArg::PerAttributeIvAndSalt)]
        mode: ModeArg,

        /// Treat the value as a date (ISO-8601) and marshal it
        #[arg(long)]
        date: bool,

        /// Marshal the value instead of storing its plain string form
        #[arg(long)]
        marshal: bool,

        /// Skip key and salt strength validation
        #[arg(long)]
        insecure: bool,
    },

    /// Decrypt a field triple back to its value
    Decrypt {
        /// Base64 ciphertext (reads a JSON triple from stdin when omitted)
        #[arg(value_name = "CIPHERTEXT")]
        ciphertext: Option<String>,

        /// Base64 IV slot
        #[arg(long)]
        iv: Option<String>,

        /// Salt slot (literal or underscore-prefixed base64)
        #[arg(long)]
        salt: Option<String>,

        /// Attribute name
        #[arg(short, long, default_value = "value")]
        attribute: String,

        /// Encryption mode the triple was written under
        #[arg(long, value_enum, default_value_t = ModeArg::PerAttributeIvAndSalt)]
        mode: ModeArg,

        /// The value was marshalled when written
        #[arg(long)]
        marshal: bool,

        /// Skip key and salt strength validation
        #[arg(long)]
        insecure: bool,
    },
}

#[derive(Copy, Clone, ValueEnum)]
enum ModeArg {
    SingleIvAndSalt,
    PerAttributeIv,
    PerAttributeIvAndSalt,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::SingleIvAndSalt => Mode::SingleIvAndSalt,
            ModeArg::PerAttributeIv => Mode::PerAttributeIv,
            ModeArg::PerAttributeIvAndSalt => Mode::PerAttributeIvAndSalt,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { bytes } => {
            if bytes < 32 {
                return Err(anyhow::anyhow!(
                    "Keys shorter than 32 bytes are rejected outside insecure mode."
                ));
            }
            println!("{}", hex::encode(cipher::random_salt(bytes)));
        }
        Commands::Encrypt {
            value,
            attribute,
            mode,
            date,
            marshal,
            insecure,
        } => {
            let key = resolve_key(cli.key, cli.key_file)?;
            let raw = match value {
                Some(v) => v,
                None => read_stdin_value()?,
            };
            let value = if date {
                let parsed: NaiveDate = raw
                    .trim()
                    .parse()
                    .map_err(|e| anyhow::anyhow!("Invalid date \"{}\": {}", raw.trim(), e))?;
                Value::Date(parsed)
            } else {
                Value::Str(raw)
            };

            let coordinator = build_coordinator(
                &attribute,
                key,
                mode.into(),
                marshal || date,
                insecure,
            )?;
            let field = coordinator.write(&attribute, &value)?;
            print_triple(&attribute, &field)?;
        }
        Commands::Decrypt {
            ciphertext,
            iv,
            salt,
            attribute,
            mode,
            marshal,
            insecure,
        } => {
            let key = resolve_key(cli.key, cli.key_file)?;
            let field = match ciphertext {
                Some(value) => EncryptedField {
                    encrypted_value: Some(value),
                    encrypted_iv: iv,
                    encrypted_salt: salt,
                },
                None => read_stdin_triple(&attribute)?,
            };

            let coordinator =
                build_coordinator(&attribute, key, mode.into(), marshal, insecure)?;
            let value = coordinator.read(&attribute, &field)?;
            if cli.quiet {
                println!("{}", value);
            } else {
                match value {
                    Value::Nil => println!("(empty)"),
                    other => println!("{}", other),
                }
            }
        }
    }

    Ok(())
}

fn build_coordinator(
    attribute: &str,
    key: Vec<u8>,
    mode: Mode,
    marshal: bool,
    insecure: bool,
) -> anyhow::Result<AttributeCoordinator> {
    let mut coordinator = AttributeCoordinator::new();
    coordinator.declare(
        AttributeConfig::new(attribute, KeySource::from_bytes(key))
            .with_mode(mode)
            .with_marshal(marshal)
            .with_insecure_mode(insecure),
    )?;
    Ok(coordinator)
}

fn resolve_key(key: Option<String>, key_file: Option<String>) -> anyhow::Result<Vec<u8>> {
    let encoded = match (key, key_file) {
        (Some(_), Some(_)) => {
            return Err(anyhow::anyhow!("--key and --key-file are mutually exclusive"));
        }
        (Some(k), None) => k,
        (None, Some(path)) => fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read key file {}: {}", path, e))?,
        (None, None) => {
            return Err(anyhow::anyhow!(
                "No key provided. Use --key, --key-file, or ATTRVAULT_KEY."
            ));
        }
    };
    hex::decode(encoded.trim()).map_err(|e| anyhow::anyhow!("Key is not valid hex: {}", e))
}

fn read_stdin_value() -> anyhow::Result<String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(anyhow::anyhow!(
            "No value provided. Pass it as an argument or pipe it on stdin."
        ));
    }
    let mut buf = String::new();
    stdin.read_to_string(&mut buf)?;
    Ok(buf.trim_end_matches('\n').to_string())
}

fn read_stdin_triple(attribute: &str) -> anyhow::Result<EncryptedField> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(anyhow::anyhow!(
            "No ciphertext provided. Pass it as an argument or pipe a JSON triple on stdin."
        ));
    }
    let mut buf = String::new();
    stdin.read_to_string(&mut buf)?;

    // Accept either the codec's own shape or the slot-named object that
    // `encrypt` prints.
    if let Ok(field) = serde_json::from_str::<EncryptedField>(&buf) {
        if !field.is_empty() {
            return Ok(field);
        }
    }
    let slots = attrvault_core::slot_names(attribute);
    let object: serde_json::Value = serde_json::from_str(&buf)
        .map_err(|e| anyhow::anyhow!("stdin is not a valid JSON triple: {}", e))?;
    let get = |name: &str| {
        object
            .get(name)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };
    Ok(EncryptedField {
        encrypted_value: get(&slots.value),
        encrypted_iv: get(&slots.iv),
        encrypted_salt: get(&slots.salt),
    })
}

fn print_triple(attribute: &str, field: &EncryptedField) -> anyhow::Result<()> {
    let slots = attrvault_core::slot_names(attribute);
    let mut object = serde_json::Map::new();
    if let Some(value) = &field.encrypted_value {
        object.insert(slots.value.clone(), serde_json::json!(value));
    }
    if let Some(iv) = &field.encrypted_iv {
        object.insert(slots.iv.clone(), serde_json::json!(iv));
    }
    if let Some(salt) = &field.encrypted_salt {
        object.insert(slots.salt.clone(), serde_json::json!(salt));
    }
    println!("{}", serde_json::to_string_pretty(&object)?);
    Ok(())
}
