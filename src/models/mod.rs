pub mod bar;
pub mod market;
pub mod resolution;

pub use bar::{round_value, Bar, CleanBar, ROUND_DECIMALS};
pub use market::{CompanyProfile, MoverDirection, MoverEntry, NewsArticle, Quote, SymbolSearchResult};
pub use resolution::Resolution;
