use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use eyre::{Result, bail, eyre};
use tracing::debug;

use tagwriter::{
    CardBatch, Outcome, TagUid, TagWriter, WriterConfig,
    apdu::StatusWord,
    config::{self, FIRST_USER_PAGE},
    ndef::{self, NdefPayload},
    simulator::MemoryTag,
    uid,
    writer::WritePlan,
};

#[derive(Parser)]
#[command(name = "tagwriter")]
#[command(about = "Write NDEF text records to one specific NFC tag", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the TLV buffer and the page writes for TEXT
    Encode {
        text: String,

        /// First page to write, pages below 4 are reserved
        #[arg(long, default_value_t = FIRST_USER_PAGE, env = "TAGWRITER_START_PAGE")]
        start_page: u8,

        /// Decode the buffer back and print the text it holds
        #[arg(long)]
        verify: bool,
    },

    /// Compare an observed UID against the expected one, fails when they differ
    #[command(name = "check-uid")]
    CheckUid {
        /// Expected UID in hex. Can also be set via TAGWRITER_EXPECTED_UID env var
        #[arg(short, long, env = "TAGWRITER_EXPECTED_UID")]
        expected_uid: String,

        /// UID read from the tag, in hex
        observed: String,
    },

    /// Run the writer loop against a simulated NTAG215
    Simulate {
        /// Expected UID in hex. Can also be set via TAGWRITER_EXPECTED_UID env var
        #[arg(short, long, env = "TAGWRITER_EXPECTED_UID")]
        expected_uid: String,

        /// UID of the simulated tag, defaults to the expected UID
        #[arg(long)]
        tag_uid: Option<String>,

        #[arg(long, default_value_t = FIRST_USER_PAGE, env = "TAGWRITER_START_PAGE")]
        start_page: u8,

        /// Per-transmit timeout in milliseconds, 0 disables it
        #[arg(long, default_value_t = 5000, env = "TAGWRITER_TIMEOUT_MS")]
        timeout_ms: u64,

        /// Make the K-th page write (1-based) fail
        #[arg(long, value_name = "K", requires = "fail_status")]
        fail_write: Option<usize>,

        /// Status word returned by the failing write, e.g. 6300
        #[arg(long, value_name = "XXXX", value_parser = parse_status, requires = "fail_write")]
        fail_status: Option<StatusWord>,

        text: String,
    },
}

fn main() -> Result<()> {
    tagwriter::logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            text,
            start_page,
            verify,
        } => encode(&text, start_page, verify),

        Commands::CheckUid {
            expected_uid,
            observed,
        } => check_uid(&expected_uid, &observed),

        Commands::Simulate {
            expected_uid,
            tag_uid,
            start_page,
            timeout_ms,
            fail_write,
            fail_status,
            text,
        } => {
            let config = WriterConfig::new(&expected_uid)?
                .with_start_page(start_page)?
                .with_transmit_timeout((timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)));

            let tag_uid = tag_uid.as_deref().unwrap_or(&expected_uid);
            let mut tag = MemoryTag::new(parse_uid(tag_uid)?);
            if let (Some(nth), Some(status)) = (fail_write, fail_status) {
                tag = tag.fail_write_at(nth, status);
            }

            simulate(config, Arc::new(tag), text)
        }
    }
}

fn encode(text: &str, start_page: u8, verify: bool) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        bail!("{}", Outcome::EmptyInput);
    }

    let start_page = config::check_start_page(start_page)?;
    let payload = NdefPayload::encode_text(text)?;
    let plan = WritePlan::new(&payload, start_page)?;

    println!("record: {} bytes", payload.record_len());
    println!("tlv:    {}", hex::encode_upper(payload.as_bytes()));
    println!("writes: {}", plan.len());
    for write in plan.iter() {
        println!("  {:>3}  {}", write.page, hex::encode_upper(write.command()));
    }

    if verify {
        let records = ndef::decode_message(payload.as_bytes())?;
        let decoded = records
            .first()
            .and_then(|record| record.text_payload())
            .ok_or_else(|| eyre!("decoded message holds no text record"))?;

        if decoded.text != text {
            bail!("round trip mismatch: {:?}", decoded.text);
        }

        println!("verify: {:?} ({})", decoded.text, decoded.language);
    }

    Ok(())
}

fn check_uid(expected: &str, observed: &str) -> Result<()> {
    let expected = parse_uid(expected)?;
    let observed = parse_uid(observed)?;

    if !uid::check(&observed, &expected) {
        println!("denied");
        bail!("{observed} is not the expected tag {expected}");
    }

    println!("granted");
    Ok(())
}

fn simulate(config: WriterConfig, tag: Arc<MemoryTag>, text: String) -> Result<()> {
    let writer = TagWriter::new(config);
    writer.set_text(text);

    let (batches, source) = flume::bounded(1);
    let handle = writer.spawn(source)?;

    batches
        .send(CardBatch::arrived(vec![tag.clone()]))
        .map_err(|_| eyre!("writer loop stopped before the tag arrived"))?;
    drop(batches);

    let outcome = handle
        .recv()
        .ok_or_else(|| eyre!("writer loop finished without an outcome"))?;
    handle
        .join()
        .map_err(|_| eyre!("writer thread panicked"))?;

    println!("{outcome}");
    for page in tag.written_pages() {
        let data = tag.page(usize::from(page)).unwrap_or_default();
        println!("  {page:>3}  {}", hex::encode_upper(data));
    }

    if !outcome.is_success() {
        bail!("write did not complete");
    }

    let records = ndef::decode_message(&tag.user_memory())?;
    debug!(records = records.len(), "tag memory decoded");

    Ok(())
}

fn parse_uid(text: &str) -> Result<TagUid> {
    TagUid::from_hex(text).map_err(|error| eyre!("invalid uid {text:?}: {error}"))
}

fn parse_status(text: &str) -> Result<StatusWord, String> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() != 4 {
        return Err(format!("expected four hex digits, got {text:?}"));
    }

    u16::from_str_radix(&digits, 16)
        .map(StatusWord::from)
        .map_err(|error| error.to_string())
}
