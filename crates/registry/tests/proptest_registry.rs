use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{Bias, RejectionReason};
use proptest::prelude::*;
use registry::{RegistryConfig, SignalRegistry};

const SYMBOLS: [&str; 3] = ["frxEURUSD", "frxUSDJPY", "frxGBPUSD"];

#[derive(Debug, Clone)]
enum Op {
    Open { symbol: usize, bullish: bool },
    ResolveOldest,
    Wait { minutes: i64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..SYMBOLS.len(), any::<bool>()).prop_map(|(symbol, bullish)| Op::Open { symbol, bullish }),
        Just(Op::ResolveOldest),
        (0i64..90).prop_map(|minutes| Op::Wait { minutes }),
    ]
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

proptest! {
    /// After any sequence of operations, no symbol has more than one open signal
    /// and every admitted signal respected the cooldown of its predecessor.
    #[test]
    fn at_most_one_open_signal_per_symbol(ops in prop::collection::vec(op(), 1..80)) {
        let cooldown = Duration::minutes(60);
        let mut reg = SignalRegistry::new(RegistryConfig { cooldown });
        let mut now = start();
        let mut admitted: HashMap<&str, DateTime<Utc>> = HashMap::new();

        for op in ops {
            match op {
                Op::Open { symbol, bullish } => {
                    let symbol = SYMBOLS[symbol];
                    let bias = if bullish { Bias::Bullish } else { Bias::Bearish };
                    match reg.try_open(symbol, bias, 1.1, now) {
                        Ok(signal) => {
                            if let Some(prev) = admitted.get(symbol) {
                                prop_assert!(now - *prev >= cooldown);
                            }
                            admitted.insert(symbol, signal.opened_at);
                        }
                        Err(RejectionReason::AlreadyOpen) => {
                            prop_assert!(reg.open_signal(symbol).is_some());
                        }
                        Err(RejectionReason::Cooldown { remaining_secs }) => {
                            prop_assert!(remaining_secs > 0);
                        }
                    }
                }
                Op::ResolveOldest => {
                    if let Some(signal) = reg.due_for_reconciliation(now, Duration::zero()).first() {
                        let outcome = signal.judge(1.2, now);
                        prop_assert!(reg.resolve(&signal.id, outcome.clone()).is_ok());
                        prop_assert!(reg.resolve(&signal.id, outcome).is_err());
                    }
                }
                Op::Wait { minutes } => now += Duration::minutes(minutes),
            }

            let pending = reg.pending();
            for symbol in SYMBOLS {
                prop_assert!(pending.iter().filter(|s| s.symbol == symbol).count() <= 1);
            }
        }
    }
}
