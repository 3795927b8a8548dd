//! Per-request identity rotation.
//!
//! The public shrink endpoint throttles by client identity, so every upload
//! goes out with a User-Agent picked from a pool of real browser strings and
//! a freshly randomized `X-Forwarded-For` address.

use rand::Rng;

/// Pool of browser User-Agent strings rotated across uploads.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:131.0) Gecko/20100101 Firefox/131.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:130.0) Gecko/20100101 Firefox/130.0",
];

/// Picks a random User-Agent from the pool.
#[must_use]
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
}

/// Generates a random dotted-quad address for the `X-Forwarded-For` header.
#[must_use]
pub fn random_forwarded_for() -> String {
    let mut rng = rand::thread_rng();
    let octets: [u8; 4] = rng.r#gen();
    format!(
        "{}.{}.{}.{}",
        octets[0], octets[1], octets[2], octets[3]
    )
}
