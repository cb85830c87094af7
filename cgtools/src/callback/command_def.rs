use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum CallbackCommand {
    /// Verifies the hash of a callback and prints what it reports. The callback is given as its query string, e.g.
    /// 'transaction=T100123&currency=EUR&amount=1295&reference=shop-01001&code=200&hash=...'.
    Verify {
        #[arg(required = true, index = 1)]
        query: String,
        /// The hash key to verify against. Defaults to CG_SITE_KEY.
        #[arg(short = 'k', long = "hash-key")]
        hash_key: Option<String>,
        /// Number of characters in front of the order id in the reference
        #[arg(short = 'p', long = "prefix-len", default_value = "6")]
        prefix_len: usize,
    },
    /// Prints the outcome that a gateway status code stands for
    Status {
        #[arg(required = true, index = 1, allow_negative_numbers = true)]
        code: i32,
    },
}
