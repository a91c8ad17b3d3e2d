use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n";
pub const CREATED: &str = "HTTP/1.1 201 Created\r\nContent-Type: application/json\r\n\r\n";
pub const BAD_REQUEST: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\n\r\n";
pub const UNAUTHORIZED: &str = "HTTP/1.1 401 Unauthorized\r\n\r\n";
pub const FORBIDDEN: &str = "HTTP/1.1 403 Forbidden\r\nContent-Type: application/json\r\n\r\n";
pub const NOT_FOUND: &str = "HTTP/1.1 404 NOT FOUND\r\n\r\n";
pub const CONFLICT: &str = "HTTP/1.1 409 Conflict\r\nContent-Type: application/json\r\n\r\n";
pub const INTERNAL_ERROR: &str = "HTTP/1.1 500 INTERNAL ERROR\r\n\r\n";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7879";
pub const DEFAULT_TRIAL_AMOUNT: Decimal = dec!(100);
pub const DEFAULT_PLAN_BONUS: Decimal = dec!(100);
pub const DEFAULT_CONFLICT_RETRIES: u32 = 8;
pub const DEFAULT_SETTLEMENT_PAGE_SIZE: i64 = 200;
pub const DEFAULT_SETTLEMENT_CONCURRENCY: usize = 8;
pub const DEFAULT_EXPIRY_SWEEP_SECS: u64 = 24 * 60 * 60;

/// Decimal places kept on every stored amount.
pub const MONEY_SCALE: u32 = 2;

pub const SUPPORTED_CURRENCIES: [&str; 3] = ["INR", "PKR", "RUB"];
