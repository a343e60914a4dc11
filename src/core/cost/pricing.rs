use rust_decimal::Decimal;

/// Hourly price for one droplet size, in thousandths of a dollar.
#[derive(Debug, Clone)]
pub struct DropletPricing {
    pub size_slug: &'static str,
    pub hourly_millis: i64,
}

/// Approximate list prices for the common droplet sizes.
static DROPLET_TABLE: &[DropletPricing] = &[
    // $5/month
    DropletPricing {
        size_slug: "s-1vcpu-1gb",
        hourly_millis: 7,
    },
    // $10/month
    DropletPricing {
        size_slug: "s-1vcpu-2gb",
        hourly_millis: 15,
    },
    // $15/month
    DropletPricing {
        size_slug: "s-2vcpu-2gb",
        hourly_millis: 22,
    },
    // $20/month
    DropletPricing {
        size_slug: "s-2vcpu-4gb",
        hourly_millis: 30,
    },
    // $40/month
    DropletPricing {
        size_slug: "s-4vcpu-8gb",
        hourly_millis: 60,
    },
];

const HOURS_PER_DAY: i64 = 24;
const DAYS_PER_MONTH: i64 = 30;

/// $0.10 per GB-month of block storage.
const VOLUME_GB_MONTH_CENTS: i64 = 10;

/// Smallest managed database plan, per month. Applied to every cluster
/// regardless of size.
const DATABASE_MONTHLY_DOLLARS: i64 = 15;

/// Look up pricing for a size slug. Returns None if unknown.
pub fn lookup(size_slug: &str) -> Option<&'static DropletPricing> {
    DROPLET_TABLE.iter().find(|p| p.size_slug == size_slug)
}

/// Cheapest entry in the size table.
pub fn minimum_hourly_price() -> Decimal {
    let millis = DROPLET_TABLE
        .iter()
        .map(|p| p.hourly_millis)
        .min()
        .unwrap_or(0);
    Decimal::new(millis, 3)
}

/// Hourly price for a droplet size. Unknown sizes are billed at the table
/// minimum.
pub fn droplet_hourly_price(size_slug: &str) -> Decimal {
    match lookup(size_slug) {
        Some(p) => Decimal::new(p.hourly_millis, 3),
        None => minimum_hourly_price(),
    }
}

pub fn droplet_daily_cost(hourly_price: Decimal) -> Decimal {
    hourly_price * Decimal::from(HOURS_PER_DAY)
}

/// Monthly GB price prorated to one day.
pub fn volume_daily_cost(size_gigabytes: u64) -> Decimal {
    Decimal::from(size_gigabytes) * Decimal::new(VOLUME_GB_MONTH_CENTS, 2)
        / Decimal::from(DAYS_PER_MONTH)
}

/// Flat per-cluster daily rate.
pub fn database_daily_cost() -> Decimal {
    Decimal::from(DATABASE_MONTHLY_DOLLARS) / Decimal::from(DAYS_PER_MONTH)
}
