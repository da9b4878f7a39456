// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token-bucket pacer for outbound calls to a single node.
///
/// `take` hands out evenly spaced slots: with a rate of `n` ops/sec each
/// caller is scheduled `1/n` seconds after the previous one and sleeps
/// until its slot comes up. A rate of zero means unlimited.
pub enum Limiter {
    Unlimited,
    Paced {
        period: Duration,
        next: Mutex<Instant>,
    },
}

impl Limiter {
    pub fn new(ops_per_sec: u32) -> Self {
        if ops_per_sec == 0 {
            Limiter::Unlimited
        } else {
            Limiter::Paced {
                period: Duration::from_secs(1) / ops_per_sec,
                next: Mutex::new(Instant::now()),
            }
        }
    }

    pub async fn take(&self) {
        match self {
            Limiter::Unlimited => (),
            Limiter::Paced { period, next } => {
                let slot = {
                    let mut next = next.lock().await;
                    let slot = (*next).max(Instant::now());
                    *next = slot + *period;
                    slot
                };
                tokio::time::sleep_until(slot).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Limiter;
    use tokio::time::Instant;

    #[tokio::test]
    async fn unlimited_does_not_block() {
        let limiter = Limiter::new(0);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.take().await;
        }
        assert!(start.elapsed().as_millis() < 100);
    }

    #[tokio::test]
    async fn paced_spaces_out_calls() {
        // 100 ops/sec means 10ms between slots; the first take is free.
        let limiter = Limiter::new(100);
        let start = Instant::now();
        for _ in 0..4 {
            limiter.take().await;
        }
        assert!(start.elapsed().as_millis() >= 30);
    }
}
