//! Keyword lists used by the fuel classifier and the anomaly flagger.
//!
//! The lists are small, hand-maintained and English-only.

use regex::Regex;

use crate::models::FuelType;

pub const DIESEL_PRODUCTS: &[&str] = &["diesel", "dsl", "ulsd", "biodiesel", "b20", "#2"];

pub const GASOLINE_PRODUCTS: &[&str] = &[
    "unleaded", "unl", "regular", "premium", "plus", "midgrade", "gasoline", "e85",
];

pub const GAS_STATIONS: &[&str] = &[
    "shell", "chevron", "exxon", "mobil", "bp", "texaco", "valero", "arco", "speedway",
    "circle k", "wawa", "sunoco", "marathon", "76", "pilot", "love's", "flying j",
    "quiktrip", "racetrac", "sheetz", "casey's",
];

pub const RESTAURANTS: &[&str] = &[
    "mcdonald", "starbucks", "subway", "chipotle", "wendy's", "burger king", "taco bell",
    "panera", "dunkin", "chick-fil-a", "domino's", "pizza hut", "doordash", "grubhub",
    "uber eats", "restaurant", "grill", "cafe", "diner", "bistro",
];

pub const PERSONAL_KEYWORDS: &[&str] = &[
    "personal", "gift", "birthday", "vacation", "netflix", "spotify", "gym", "groceries",
    "alcohol", "liquor", "casino", "family", "kids",
];

/// Case-insensitive, word-bounded keyword matcher.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    words: Vec<String>,
    re: Option<Regex>,
}

impl KeywordSet {
    pub fn new<S: AsRef<str>>(words: &[S]) -> Result<Self, regex::Error> {
        let words: Vec<String> = words
            .iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return Ok(Self { words, re: None });
        }
        // Longest first so "circle k" wins over a shorter overlapping word.
        let mut sorted = words.clone();
        sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = sorted
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        // \b does not anchor next to non-word characters such as '#', so
        // boundaries are expressed as "not preceded/followed by a word char".
        let re = Regex::new(&format!(r"(?i)(?:^|[^\w])({alternation})(?:[^\w]|$)"))?;
        Ok(Self { words, re: Some(re) })
    }

    /// Returns the first keyword found in `text`, lowercased.
    pub fn find(&self, text: &str) -> Option<String> {
        let re = self.re.as_ref()?;
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
    }

    pub fn matches(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }
}

/// All keyword sets the evaluator consults, compiled once per configuration.
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub diesel_products: KeywordSet,
    pub gasoline_products: KeywordSet,
    pub gas_stations: KeywordSet,
    pub restaurants: KeywordSet,
    pub personal: KeywordSet,
}

impl Lexicon {
    pub fn builtin() -> Result<Self, regex::Error> {
        Ok(Self {
            diesel_products: KeywordSet::new(DIESEL_PRODUCTS)?,
            gasoline_products: KeywordSet::new(GASOLINE_PRODUCTS)?,
            gas_stations: KeywordSet::new(GAS_STATIONS)?,
            restaurants: KeywordSet::new(RESTAURANTS)?,
            personal: KeywordSet::new(PERSONAL_KEYWORDS)?,
        })
    }

    /// Derive a fuel type from a fuel-card product code or description.
    /// Diesel keywords are checked first.
    pub fn classify_fuel(&self, product: &str) -> Option<FuelType> {
        if self.diesel_products.matches(product) {
            Some(FuelType::Diesel)
        } else if self.gasoline_products.matches(product) {
            Some(FuelType::Gasoline)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Lexicon {
        Lexicon::builtin().unwrap()
    }

    #[test]
    fn test_classify_fuel_products() {
        let lx = lexicon();
        assert_eq!(lx.classify_fuel("DSL #2 CLEAR"), Some(FuelType::Diesel));
        assert_eq!(lx.classify_fuel("Diesel"), Some(FuelType::Diesel));
        assert_eq!(lx.classify_fuel("UNL 87"), Some(FuelType::Gasoline));
        assert_eq!(lx.classify_fuel("Premium Unleaded"), Some(FuelType::Gasoline));
        assert_eq!(lx.classify_fuel("CAR WASH"), None);
    }

    #[test]
    fn test_keywords_respect_word_boundaries() {
        let set = KeywordSet::new(&["bp", "76"]).unwrap();
        assert!(set.matches("BP #1234 AUSTIN"));
        assert!(set.matches("76 - Main St"));
        assert!(!set.matches("BPM SUPPLY"));
        assert!(!set.matches("STORE 1976"));
    }

    #[test]
    fn test_find_reports_keyword() {
        let lx = lexicon();
        assert_eq!(lx.personal.find("Birthday dinner for Sam").as_deref(), Some("birthday"));
        assert_eq!(lx.gas_stations.find("CIRCLE K 2231").as_deref(), Some("circle k"));
        assert_eq!(lx.restaurants.find("McDonald's 441").as_deref(), Some("mcdonald"));
    }

    #[test]
    fn test_empty_set_never_matches() {
        let set = KeywordSet::new::<&str>(&[]).unwrap();
        assert_eq!(set.len(), 0);
        assert!(!set.matches("anything"));
    }
}
