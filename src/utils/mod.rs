// Utility functions for ticker handling

pub mod tickers {
    use std::path::Path;

    /// Fallback when no ticker file is available
    pub const DEFAULT_TICKERS: &[&str] = &["AAPL"];

    /// Normalize a ticker for the market-data provider: `brk.b ` -> `BRK-B`
    pub fn normalize_symbol(symbol: &str) -> String {
        symbol.trim().to_uppercase().replace('.', "-")
    }

    /// Normalize a list of tickers, dropping blanks and duplicates (order kept)
    pub fn normalize_symbols<S: AsRef<str>>(symbols: &[S]) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let normalized = normalize_symbol(symbol.as_ref());
            if !normalized.is_empty() && !out.contains(&normalized) {
                out.push(normalized);
            }
        }
        out
    }

    /// Parse a comma separated ticker list ("AAPL, msft")
    pub fn parse_ticker_list(raw: &str) -> Vec<String> {
        let parts: Vec<&str> = raw.split(',').collect();
        normalize_symbols(&parts)
    }

    /// Parse ticker file contents: one ticker per line, optional UTF-8 BOM
    pub fn parse_ticker_file(contents: &str) -> Vec<String> {
        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
        let lines: Vec<&str> = contents.lines().collect();
        normalize_symbols(&lines)
    }

    /// Load the tracked ticker list, falling back to [`DEFAULT_TICKERS`]
    pub fn load_ticker_file(path: &Path) -> Vec<String> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let tickers = parse_ticker_file(&contents);
                if tickers.is_empty() {
                    tracing::warn!("{} is empty, using default ticker list", path.display());
                    return default_tickers();
                }
                tracing::info!("Loaded {} tickers from {}", tickers.len(), path.display());
                tickers
            }
            Err(e) => {
                tracing::warn!(
                    "Could not read {} ({}), using default ticker list",
                    path.display(),
                    e
                );
                default_tickers()
            }
        }
    }

    pub fn default_tickers() -> Vec<String> {
        DEFAULT_TICKERS.iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::tickers::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" brk.b "), "BRK-B");
        assert_eq!(normalize_symbol("aapl"), "AAPL");
    }

    #[test]
    fn test_normalize_symbols_dedupes() {
        let symbols = normalize_symbols(&["aapl", "AAPL", "", "msft"]);
        assert_eq!(symbols, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn test_parse_ticker_list() {
        assert_eq!(parse_ticker_list("AAPL, msft,,nvda"), vec!["AAPL", "MSFT", "NVDA"]);
        assert!(parse_ticker_list("").is_empty());
    }

    #[test]
    fn test_parse_ticker_file_with_bom() {
        let contents = "\u{feff}AAPL\r\n\r\nMSFT\nbrk.b\n";
        assert_eq!(parse_ticker_file(contents), vec!["AAPL", "MSFT", "BRK-B"]);
    }

    #[test]
    fn test_missing_ticker_file_falls_back() {
        let tickers = load_ticker_file(std::path::Path::new("/nonexistent/stock_tickers.txt"));
        assert_eq!(tickers, vec!["AAPL"]);
    }

    #[test]
    fn test_load_ticker_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stock_tickers.txt");
        std::fs::write(&path, "tsla\nGOOG\n").unwrap();
        assert_eq!(load_ticker_file(&path), vec!["TSLA", "GOOG"]);
    }
}
