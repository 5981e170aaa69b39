//! # Strata Pacer Simulator
//!
//! Runs a pacer against a simulated video source on a manual clock and
//! prints the resulting statistics as JSON. Useful for checking how a policy
//! change affects queuing delay and starvation overrides without a network.
//!
//! ## Usage
//!
//! ```bash
//! # 2 s of 30 fps video, 8 packets per frame, default policy
//! strata-pacer-sim
//!
//! # Custom policy and load
//! strata-pacer-sim --config pacer.toml --duration-ms 10000 --burst 20 --pad-kbps 600
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use strata_pacer::{Clock, ManualClock, Pacer, PacerConfig, PacketSink, Priority};

const FRAME_INTERVAL_MS: i64 = 33;
const RETRANSMIT_INTERVAL_MS: i64 = 200;
const STREAM_ID: u32 = 0x5354_5241;

fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    // ── Parse CLI ───────────────────────────────────────────────
    let args = parse_args()?;
    let config = match &args.config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("cannot read config '{}': {}", path, e))?;
            PacerConfig::from_toml_str(&text)?
        }
        None => PacerConfig::default(),
    };

    tracing::info!(
        duration_ms = args.duration_ms,
        burst = args.burst,
        packet_size = args.packet_size,
        target_kbps = config.initial_target_kbps,
        pace_multiplier = config.pace_multiplier,
        "strata-pacer-sim starting"
    );

    // ── Pacer ───────────────────────────────────────────────────
    let clock = ManualClock::new(0);
    let sink = Arc::new(CountingSink::default());
    let target_kbps = config.initial_target_kbps;
    let pacer = Pacer::with_clock(sink.clone(), clock.clone(), config);
    pacer.update_rates(target_kbps, args.pad_kbps);
    pacer.set_enabled(true);

    // ── Main loop (1 ms steps) ──────────────────────────────────
    let mut sequence: u16 = 0;
    let mut max_delay_ms = 0;
    while clock.now_ms() < args.duration_ms {
        let now_ms = clock.now_ms();

        if now_ms % FRAME_INTERVAL_MS == 0 {
            for _ in 0..args.burst {
                if pacer.enqueue_or_send_now(
                    Priority::Normal,
                    STREAM_ID,
                    sequence,
                    now_ms,
                    args.packet_size,
                ) {
                    sink.send_now(STREAM_ID, sequence, now_ms);
                }
                sequence = sequence.wrapping_add(1);
            }
        }

        if now_ms > 0 && now_ms % RETRANSMIT_INTERVAL_MS == 0 {
            // Re-request a packet from a few frames back.
            let lost = sequence.wrapping_sub(args.burst.wrapping_mul(3));
            if pacer.enqueue_or_send_now(Priority::High, STREAM_ID, lost, -1, args.packet_size) {
                sink.send_now(STREAM_ID, lost, now_ms);
            }
        }

        if pacer.time_until_next_tick().is_zero() {
            pacer.tick();
        }

        max_delay_ms = max_delay_ms.max(pacer.queuing_delay_ms());
        if now_ms > 0 && now_ms % 500 == 0 {
            tracing::info!(
                now_ms,
                queued = pacer.queue_len(),
                delay_ms = pacer.queuing_delay_ms(),
                media_budget = pacer.budgets().media,
                "pacer state"
            );
        }

        clock.advance_ms(1);
    }

    // ── Report ──────────────────────────────────────────────────
    let stats = pacer.stats();
    tracing::info!(
        sent = sink.packets.load(Ordering::Relaxed),
        padding_bytes = sink.padding_bytes.load(Ordering::Relaxed),
        left_queued = pacer.queue_len(),
        max_delay_ms,
        forced_ratio = stats.forced_ratio(),
        "strata-pacer-sim finished"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

// ─── Sink ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingSink {
    packets: AtomicU64,
    padding_bytes: AtomicU64,
}

impl PacketSink for CountingSink {
    fn send_now(&self, _stream_id: u32, _sequence: u16, _capture_time_ms: i64) {
        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    fn produce_padding(&self, max_bytes: usize) -> usize {
        self.padding_bytes
            .fetch_add(max_bytes as u64, Ordering::Relaxed);
        max_bytes
    }
}

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct Args {
    config_path: Option<String>,
    duration_ms: i64,
    burst: u16,
    packet_size: usize,
    pad_kbps: u32,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config_path: None,
        duration_ms: 2000,
        burst: 8,
        packet_size: 1200,
        pad_kbps: 0,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("{} requires a value", flag))
        };
        match flag {
            "--config" => parsed.config_path = Some(value()?),
            "--duration-ms" => parsed.duration_ms = parse_number(flag, &value()?)?,
            "--burst" => parsed.burst = parse_number(flag, &value()?)?,
            "--packet-size" => parsed.packet_size = parse_number(flag, &value()?)?,
            "--pad-kbps" => parsed.pad_kbps = parse_number(flag, &value()?)?,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                anyhow::bail!("unknown argument: {other}\nRun with --help for usage.");
            }
        }
        i += 2;
    }

    Ok(parsed)
}

fn parse_number<T>(flag: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid value '{}' for {}: {}", value, flag, e))
}

fn print_usage() {
    eprintln!(
        "Usage: strata-pacer-sim [OPTIONS]

Options:
  --config <FILE>        Pacer policy TOML
  --duration-ms <N>      Simulated time [default: 2000]
  --burst <N>            Packets per video frame, at most 65535 [default: 8]
  --packet-size <N>      Bytes per packet [default: 1200]
  --pad-kbps <N>         Pad-up-to rate [default: 0]
  -h, --help             Print this help"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_out_of_range_is_rejected() {
        assert_eq!(parse_number::<u16>("--burst", "65535").unwrap(), u16::MAX);
        assert!(parse_number::<u16>("--burst", "70000").is_err());
    }
}
