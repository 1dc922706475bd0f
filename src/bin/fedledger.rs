//! Fedledger CLI — federated round driver and key utilities
//!
//! Commands:
//!   fedledger keygen            — generate a direct AES-256 key (base64)
//!   fedledger train <file>      — train on a records JSON file, print weights
//!   fedledger demo              — run a full federated round locally

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use fedledger_core::aggregate::{unseal_batch, Aggregator, Submission};
use fedledger_core::model::{LocalTrainer, TransactionRecord};
use fedledger_core::secure::{KeyConfig, SecureChannel};
use rand::RngCore;
use std::env;

fn print_usage() {
    println!(
        r#"
Fedledger — federated anomaly-model core for ledger apps

Usage: fedledger <command> [options]

Commands:
  keygen                    Generate a direct AES-256 key (base64, for FEDERATED_AES_KEY)
  train  <records.json>     Train local weights on a ledger export and print them
  demo                      Run a full round: 3 clients train, encrypt, aggregate
  help                      Show this message

Key material comes from the environment:
  FEDERATED_AES_KEY         base64 32-byte key (takes precedence), or
  FEDERATED_MASTER_SECRET + FEDERATED_SALT (hex, >=16 bytes)
"#
    );
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "keygen" => cmd_keygen(),
        "train" => cmd_train(&args[2..]),
        "demo" => cmd_demo(),
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
        }
    }
}

fn demo_channel() -> SecureChannel {
    // Prefer real key material from the environment; fall back to a
    // throwaway demo key so `fedledger demo` works out of the box.
    let config = KeyConfig::from_env().unwrap_or_else(|_| {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        println!("  No key material in environment, using a throwaway demo key");
        KeyConfig::Direct {
            key_b64: BASE64.encode(key),
        }
    });

    match SecureChannel::new(&config) {
        Ok(channel) => channel,
        Err(e) => {
            eprintln!("  Failed to set up secure channel: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_keygen() {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    println!("\n  FEDERATED_AES_KEY={}", BASE64.encode(key));
}

fn cmd_train(args: &[String]) {
    let path = match args.first() {
        Some(p) => p,
        None => {
            eprintln!("Usage: fedledger train <records.json>");
            return;
        }
    };

    let records: Vec<TransactionRecord> = match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|data| serde_json::from_str(&data).map_err(|e| e.to_string()))
    {
        Ok(records) => records,
        Err(e) => {
            eprintln!("  Failed to load records from '{}': {}", path, e);
            return;
        }
    };

    let mut trainer = LocalTrainer::new();
    trainer.train(&records);

    println!("\n  Trained on {} records", records.len());
    if trainer.skipped_dates() > 0 {
        println!("  Skipped {} unparseable dates", trainer.skipped_dates());
    }
    match serde_json::to_string_pretty(trainer.weights()) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("  Serialization error: {}", e),
    }
}

fn cmd_demo() {
    println!("\n  Fedledger demo — one full federated round");
    println!("  {}", "=".repeat(50));

    let channel = demo_channel();

    // Step 1: three clients train on their own synthetic ledgers
    println!("\n  Step 1: local training on 3 devices");
    let mut submissions = Vec::new();
    for device in ["device-a", "device-b", "device-c"] {
        let records = TransactionRecord::synthetic(120);
        let mut trainer = LocalTrainer::new();
        trainer.train(&records);
        let weights = trainer.weights();
        println!(
            "    {} | threshold={:.3} | categories={:?}",
            device,
            weights.anomaly_threshold,
            weights
                .category_weights
                .iter()
                .map(|v| (v * 100.0).round() / 100.0)
                .collect::<Vec<_>>()
        );

        // Step 2 happens per device: hash, then encrypt
        let package = match channel.create_secure_package(weights) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("    Encryption failed for {}: {}", device, e);
                return;
            }
        };
        submissions.push(Submission {
            device_id: device.to_string(),
            package,
        });
    }

    println!("\n  Step 2: {} encrypted packages created", submissions.len());
    println!(
        "    nonce[0]={} hash[0]={}...",
        submissions[0].package.nonce,
        &submissions[0].package.integrity_hash[..16]
    );

    // Step 3: coordinator decrypts and verifies each submission
    println!("\n  Step 3: intake (decrypt + verify)");
    let report = unseal_batch(&channel, &submissions);
    println!(
        "    accepted={} rejected={}",
        report.accepted.len(),
        report.rejected.len()
    );

    // Step 4: fold the survivors into the global model
    println!("\n  Step 4: aggregation");
    let aggregator = Aggregator::new();
    match aggregator.aggregate(&report.weights()) {
        Ok(model) => {
            println!(
                "    version={} | clients={} | threshold={:.3}",
                model.weights.version, model.client_count, model.weights.anomaly_threshold
            );
        }
        Err(e) => {
            eprintln!("    Aggregation failed: {}", e);
            return;
        }
    }

    match aggregator.summary() {
        Ok(summary) => {
            println!("\n  Round complete");
            println!("    rounds={}", summary.rounds);
            println!("    model_hash={}...", &summary.model_hash[..16]);
        }
        Err(e) => eprintln!("  Summary error: {}", e),
    }
}
