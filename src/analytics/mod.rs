//! Income and expense aggregation over transaction allocations.

mod aggregation;
mod endpoints;
mod financial;
mod summary;

pub use aggregation::{Period, PeriodBucket, Totals, group_by_period};
pub use endpoints::{
    AnalyticsState, get_analytics_endpoint, get_category_totals_endpoint,
    get_financial_data_endpoint, get_totals_endpoint,
};
pub use financial::{CategoryAmount, FinancialData, FinancialPeriod, FinancialRange, get_financial_data};
pub use summary::{
    Analytics, CategoryTotal, SubcategoryTotal, get_analytics, get_category_totals, get_totals,
};
