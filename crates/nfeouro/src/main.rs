#![forbid(unsafe_code)]

//! nfeouro CLI: sign DAO documents and prepare reception service requests.

use clap::{Args, Parser, Subcommand};
use nfeouro::keys::Certificate;
use nfeouro::transport::Request;
use nfeouro::{CredentialSource, DaoSigner, Error, Settings};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(
    name = "nfeouro",
    about = "NF-e Ouro DAO signing (XML-DSig, A1 credentials, request framing)",
    version
)]
struct Cli {
    /// Settings file (default: config/settings.* if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CredentialArgs {
    /// PKCS#12 (A1) container
    #[arg(long)]
    p12: Option<PathBuf>,

    /// Container passphrase
    #[arg(long)]
    passphrase: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize, sign and self-verify a DAO document
    Sign {
        /// Input XML file
        file: PathBuf,

        #[command(flatten)]
        credential: CredentialArgs,

        /// Signature profile (rsa-sha1 or rsa-sha256)
        #[arg(long)]
        profile: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a signed DAO document
    Verify {
        /// Signed XML file
        file: PathBuf,

        /// Verifying certificate (PEM or DER)
        #[arg(long, conflicts_with = "p12")]
        cert: Option<PathBuf>,

        #[command(flatten)]
        credential: CredentialArgs,
    },

    /// Sign a document and print the submission request as JSON
    Envelope {
        /// Input XML file
        file: PathBuf,

        #[command(flatten)]
        credential: CredentialArgs,

        /// Signature profile (rsa-sha1 or rsa-sha256)
        #[arg(long)]
        profile: Option<String>,

        /// Value of X-Forwarded-For
        #[arg(long)]
        ip: Option<String>,
    },

    /// Print a lookup request as JSON
    Query {
        /// Access key of the NF-e Ouro
        #[arg(long, conflicts_with = "nsu", required_unless_present = "nsu")]
        access_key: Option<String>,

        /// Reception NSU
        #[arg(long)]
        nsu: Option<u64>,

        #[command(flatten)]
        credential: CredentialArgs,

        /// Value of X-Forwarded-For
        #[arg(long)]
        ip: Option<String>,
    },

    /// Show the signing profile and the configured endpoint
    Info,
}

fn main() {
    let cli = Cli::parse();
    nfeouro::telemetry::init_tracing();

    let result = load_settings(cli.config.as_deref()).and_then(|settings| match cli.command {
        Commands::Sign {
            file,
            credential,
            profile,
            output,
        } => cmd_sign(&settings, &file, credential, profile, output),

        Commands::Verify {
            file,
            cert,
            credential,
        } => cmd_verify(&settings, &file, cert, credential),

        Commands::Envelope {
            file,
            credential,
            profile,
            ip,
        } => cmd_envelope(&settings, &file, credential, profile, ip),

        Commands::Query {
            access_key,
            nsu,
            credential,
            ip,
        } => cmd_query(&settings, access_key, nsu, credential, ip),

        Commands::Info => cmd_info(&settings),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, Error> {
    match path {
        Some(path) => Settings::load_file(path),
        None => Settings::load(),
    }
}

fn cmd_sign(
    settings: &Settings,
    file: &Path,
    credential: CredentialArgs,
    profile: Option<String>,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let signer = signer(settings, profile)?;
    let source = credential_source(settings, credential)?;
    let signed = signer.sign_file(file, &source)?;
    write_output(output, signed.xml.as_bytes())
}

fn cmd_verify(
    settings: &Settings,
    file: &Path,
    cert: Option<PathBuf>,
    credential: CredentialArgs,
) -> Result<(), Error> {
    let xml = read_file(file)?;
    let certificate = match cert {
        Some(path) => read_certificate(&path)?,
        None => credential_source(settings, credential)?
            .load()?
            .certificate()
            .clone(),
    };

    match DaoSigner::from_settings(settings)?.verify(&xml, &certificate) {
        Ok(true) => {
            println!("OK");
            Ok(())
        }
        Ok(false) => {
            eprintln!("INVALID: signature did not validate");
            process::exit(1);
        }
        Err(Error::Core(reason)) if reason.is_invalid_signature() => {
            eprintln!("INVALID: {reason}");
            process::exit(1);
        }
        Err(e) => Err(e),
    }
}

fn cmd_envelope(
    settings: &Settings,
    file: &Path,
    credential: CredentialArgs,
    profile: Option<String>,
    ip: Option<String>,
) -> Result<(), Error> {
    let signer = signer(settings, profile)?;
    let source = credential_source(settings, credential)?;
    let ip = source_ip(settings, ip)?;
    let xml = read_file(file)?;
    let submission = signer.submission(&xml, &source, &ip)?;
    print_request(&submission.request)
}

fn cmd_query(
    settings: &Settings,
    access_key: Option<String>,
    nsu: Option<u64>,
    credential: CredentialArgs,
    ip: Option<String>,
) -> Result<(), Error> {
    let signer = DaoSigner::from_settings(settings)?;
    let source = credential_source(settings, credential)?;
    let ip = source_ip(settings, ip)?;
    let request = match (access_key, nsu) {
        (Some(key), _) => signer.lookup_by_access_key(&key, &source, &ip)?,
        (None, Some(nsu)) => signer.lookup_by_nsu(nsu, &source, &ip)?,
        (None, None) => return Err(Error::Config("--access-key or --nsu is required".into())),
    };
    print_request(&request)
}

fn cmd_info(settings: &Settings) -> Result<(), Error> {
    let signer = DaoSigner::from_settings(settings)?;
    let profile = signer.profile();
    let endpoint = signer.endpoint();

    println!("nfeouro {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Signing profile: {}", profile.name());
    println!("  canonicalization: {}", profile.canonicalization);
    println!("  signature method: {}", profile.signature_method);
    println!("  digest method:    {}", profile.digest_method);
    println!("  reference target: {}", signer.target());
    println!();
    println!("Endpoint: {}", endpoint.base_url());
    println!("  submit:  POST {}", endpoint.submit_url());
    println!("  lookup:  GET  {}/nfeouro/{{access-key}}", endpoint.base_url());
    println!("  lookup:  GET  {}/nsu/{{nsu}}/nfeouro", endpoint.base_url());
    println!();
    match &settings.credential.path {
        Some(path) => println!("Credential: {}", path.display()),
        None => println!("Credential: (not configured)"),
    }
    Ok(())
}

fn signer(settings: &Settings, profile: Option<String>) -> Result<DaoSigner, Error> {
    let signer = DaoSigner::from_settings(settings)?;
    match profile {
        Some(name) => Ok(DaoSigner::new(name.parse()?, signer.endpoint().clone())),
        None => Ok(signer),
    }
}

fn credential_source(
    settings: &Settings,
    args: CredentialArgs,
) -> Result<CredentialSource, Error> {
    CredentialSource::resolve(
        args.p12,
        args.passphrase.map(SecretString::from),
        &settings.credential,
    )
}

fn source_ip(settings: &Settings, ip: Option<String>) -> Result<String, Error> {
    ip.or_else(|| settings.signing.source_ip.clone())
        .ok_or_else(|| Error::Config("no source address (--ip or signing.source_ip)".into()))
}

fn read_certificate(path: &Path) -> Result<Certificate, Error> {
    let data = std::fs::read(path).map_err(|e| Error::File {
        path: path.display().to_string(),
        source: e,
    })?;
    let certificate = match std::str::from_utf8(&data) {
        Ok(text) if !data.starts_with(&[0x30]) => Certificate::from_pem(text)?,
        _ => Certificate::from_der(&data)?,
    };
    Ok(certificate)
}

fn print_request(request: &Request) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(request)
        .map_err(|e| nfeouro::core::Error::Transport(format!("cannot render request: {e}")))?;
    println!("{json}");
    Ok(())
}

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| Error::File {
        path: path.display().to_string(),
        source: e,
    })
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => std::fs::write(&p, data).map_err(|e| Error::File {
            path: p.display().to_string(),
            source: e,
        }),
        None => {
            use std::io::Write;
            std::io::stdout().write_all(data).map_err(|e| Error::File {
                path: "stdout".into(),
                source: e,
            })
        }
    }
}
