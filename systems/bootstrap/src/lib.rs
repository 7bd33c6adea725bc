#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Bootstrap fixtures that seed a leveling session with a bid package.
//!
//! The leveling page fixture mirrors the package estimators see first. The
//! generated fixture draws bidders from the vendor roster and scope items
//! from specification divisions, deterministically for a given seed.

use std::collections::BTreeSet;

use bid_leveling_core::{Bidder, ScopeId, ScopeItem};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const ROSTER_SIZE: usize = 30;
const SECTIONS_PER_DIVISION: u32 = 10_000;
const ROSTER_NAMES: [&str; 7] = [
    "Summit Mechanical Contractors",
    "BlueRiver Electric",
    "IronPeak Steel",
    "Redline Plumbing",
    "Canyon Concrete",
    "Northstar Drywall",
    "Evergreen Fireproofing",
];

const LEVELING_PAGE_BIDDERS: [&str; 5] = ["VND-044", "VND-012", "VND-028", "VND-006", "VND-019"];
const LEVELING_PAGE_SCOPES: [(&str, &str); 5] = [
    ("CSI-23-0900", "Instrumentation and Control for HVAC"),
    ("CSI-23-3400", "HVAC Fans"),
    ("CSI-23-3700", "Air Outlets and Inlets"),
    ("CSI-23-7310", "Indoor Central-Station Air-Handling Units"),
    ("CSI-23-0500", "Common Work Results for HVAC"),
];

struct Division {
    code: &'static str,
    name: &'static str,
    items: &'static [&'static str],
}

const DIVISIONS: [Division; 6] = [
    Division {
        code: "03",
        name: "Concrete",
        items: &["Formwork", "Reinforcing", "Cast-in-Place", "Precast", "Grouting"],
    },
    Division {
        code: "05",
        name: "Metals",
        items: &["Structural Framing", "Joists", "Decking", "Metal Fabrications"],
    },
    Division {
        code: "09",
        name: "Finishes",
        items: &["Gypsum Board", "Acoustical Ceilings", "Tiling", "Painting"],
    },
    Division {
        code: "22",
        name: "Plumbing",
        items: &["Piping", "Fixtures", "Domestic Water Heaters", "Medical Gas"],
    },
    Division {
        code: "23",
        name: "HVAC",
        items: &["Ductwork", "Air Outlets", "Fans", "Controls", "Air Handlers"],
    },
    Division {
        code: "26",
        name: "Electrical",
        items: &["Distribution", "Lighting", "Grounding", "Panelboards"],
    },
];

/// Bidders and scope items that make up one bid package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoPackage {
    bidders: Vec<Bidder>,
    scope_items: Vec<ScopeItem>,
}

impl DemoPackage {
    /// Package shown on the leveling page: five HVAC scope items and five bidders.
    #[must_use]
    pub fn leveling_page() -> Self {
        let bidders = LEVELING_PAGE_BIDDERS
            .iter()
            .map(|id| Bidder::new(*id, *id))
            .collect();
        let scope_items = LEVELING_PAGE_SCOPES
            .iter()
            .map(|(id, label)| ScopeItem::new(*id, *label).with_group("HVAC"))
            .collect();
        Self {
            bidders,
            scope_items,
        }
    }

    /// Generates a package with up to `bidder_count` roster vendors and `scope_count` scope items.
    ///
    /// Identical arguments always produce identical packages. The bidder
    /// count is capped by the roster size and the scope count by the number
    /// of distinct section codes.
    #[must_use]
    pub fn generated(seed: u64, bidder_count: usize, scope_count: usize) -> Self {
        let scope_count = scope_count.min(DIVISIONS.len() * SECTIONS_PER_DIVISION as usize);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut roster = vendor_roster();
        roster.shuffle(&mut rng);
        roster.truncate(bidder_count);

        let mut seen = BTreeSet::new();
        let mut scope_items = Vec::with_capacity(scope_count);
        while scope_items.len() < scope_count {
            let division = &DIVISIONS[rng.gen_range(0..DIVISIONS.len())];
            let section = rng.gen_range(0..SECTIONS_PER_DIVISION);
            let id = format!("CSI-{}-{section:04}", division.code);
            if !seen.insert(id.clone()) {
                continue;
            }
            let item = division.items[rng.gen_range(0..division.items.len())];
            let label = format!("{} {item}", division.name);
            scope_items.push(ScopeItem::new(id, label).with_group(division.name));
        }

        Self {
            bidders: roster,
            scope_items,
        }
    }

    /// Bidders in column order.
    #[must_use]
    pub fn bidders(&self) -> &[Bidder] {
        &self.bidders
    }

    /// Scope items in row order.
    #[must_use]
    pub fn scope_items(&self) -> &[ScopeItem] {
        &self.scope_items
    }

    /// Scope identifiers in row order.
    #[must_use]
    pub fn scope_ids(&self) -> Vec<ScopeId> {
        self.scope_items.iter().map(|item| item.id.clone()).collect()
    }
}

/// Full vendor roster in identifier order.
#[must_use]
pub fn vendor_roster() -> Vec<Bidder> {
    (0..ROSTER_SIZE)
        .map(|index| {
            let base = ROSTER_NAMES[index % ROSTER_NAMES.len()];
            let label = if index >= ROSTER_NAMES.len() {
                format!("{base} ({})", index + 1)
            } else {
                base.to_owned()
            };
            Bidder::new(format!("VND-{:03}", index + 1), label)
        })
        .collect()
}
