use std::collections::HashMap;

// ---------------------------------------------------------------------------
// City table: place name → two-letter abbreviation
// ---------------------------------------------------------------------------

/// Place names commonly found in influenza strain names.
const BUILTIN_CITIES: &[(&str, &str)] = &[
    ("AN", "ANHUI"),
    ("AL", "AUSTRALIA"),
    ("BA", "BANGKOK"),
    ("BE", "BEIJING"),
    ("BR", "BRISBANE"),
    ("CA", "CANBERRA"),
    ("CF", "CALIFORNIA"),
    ("EG", "EGYPT"),
    ("FP", "CAMBODIA"),
    ("GD", "GUANGDONG"),
    ("GX", "GUANGXI"),
    ("GZ", "GUANGZHOU"),
    ("HD", "HOKKAIDO"),
    ("HK", "HONG-KONG"),
    ("ID", "INDONESIA"),
    ("JL", "TURKEY"),
    ("JP", "JAPAN"),
    ("MW", "MOSCOW"),
    ("NL", "NETHERLANDS"),
    ("NY", "NEW-YORK"),
    ("PE", "PERTH"),
    ("SD", "SHANGDONG"),
    ("SH", "SHANGHAI"),
    ("SP", "SINGAPORE"),
    ("TE", "TEXAS"),
    ("TY", "TOKYO"),
    ("VE", "VIETNAM"),
    ("VI", "VICTORIA"),
    ("WN", "WISCONSIN"),
];

/// A place name with its abbreviation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct City {
    pub name: String,
    pub abb: String,
}

/// Direct-lookup table of city names.
///
/// Names match after upper-casing and dropping `-`, `_`, space and `/`, so
/// `HONG KONG`, `HONG_KONG` and `HONGKONG` all resolve to `HONG-KONG`. There
/// is no fuzzy matching here.
#[derive(Debug, Clone, Default)]
pub struct CityTable {
    cities: Vec<City>,
    by_alias: HashMap<String, usize>,
}

impl CityTable {
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN_CITIES.iter().copied())
    }

    /// Build a table from `(abbreviation, name)` pairs. Later pairs never
    /// shadow an alias claimed by an earlier one.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut table = CityTable::default();
        for (abb, name) in pairs {
            let alias = city_alias(name);
            if alias.is_empty() {
                log::warn!("Skipping city with empty name (abbreviation {abb})");
                continue;
            }
            if table.by_alias.contains_key(&alias) {
                log::warn!("City {name} duplicates an existing entry, ignoring {abb}");
                continue;
            }
            table.by_alias.insert(alias, table.cities.len());
            table.cities.push(City {
                name: name.to_uppercase(),
                abb: abb.to_string(),
            });
        }
        table
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Look up a city by name or alias.
    pub fn lookup(&self, name: &str) -> Option<&City> {
        self.by_alias
            .get(&city_alias(name))
            .map(|&idx| &self.cities[idx])
    }

    /// Replace every `/`-delimited component naming a known city with its
    /// abbreviation.
    pub fn abbreviate(&self, long: &str) -> String {
        long.split('/')
            .map(|part| match self.lookup(part) {
                Some(city) => city.abb.as_str(),
                None => part,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn city_alias(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' ' | '/'))
        .flat_map(char::to_uppercase)
        .collect()
}
