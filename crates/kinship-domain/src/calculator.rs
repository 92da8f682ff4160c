//! Relationship calculator
//!
//! Turns a path of relationship steps into a kinship label ("paternal grandfather",
//! "second cousin once removed"), a coarse category and a genetic-similarity estimate.
//!
//! Each step names what the person reached by the step is to the previous person, so
//! `[FatherOf, MotherOf]` reads "my father's mother" and is described as
//! "paternal grandmother". The description is always of the *last* person on the path
//! as seen from the *first*.
//!
//! The calculator is total: any path it cannot name falls back to a generational
//! description such as "distant relative (2 up, 3 down)".

use crate::{Gender, Lineage, RelationshipKind};
use serde::{Deserialize, Serialize};

/// Highest percentage the similarity heuristic reports
pub const MAX_GENETIC_SIMILARITY: f64 = 50.0;

/// Lowest non-zero percentage the similarity heuristic reports
pub const MIN_GENETIC_SIMILARITY: f64 = 0.1;

/// Coarse grouping of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipCategory {
    /// Parents, children, siblings, spouse
    Immediate,
    /// Grandparents, aunts and uncles, first cousins
    Extended,
    /// Everything further away
    Distant,
    /// Related only through marriage at the same generation
    NonBlood,
}

/// Outcome of a relationship calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipResult {
    /// Natural-language label
    pub description: String,

    /// Coarse category
    pub category: RelationshipCategory,

    /// Number of ascend steps on the path
    pub generations_up: u32,

    /// Number of descend steps on the path
    pub generations_down: u32,

    /// False as soon as the path crosses a marriage
    pub is_blood_relation: bool,

    /// Estimated shared ancestry in percent, in `[0, 50]`
    pub genetic_similarity: f64,
}

/// Cousin degree and removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CousinDegree {
    /// The "Nth" in "Nth cousin"
    pub degree: u32,
    /// Generational offset between the two cousins
    pub removal: u32,
}

/// Step counts of a path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    up: u32,
    down: u32,
    marriages: u32,
}

impl Tally {
    fn of(path: &[RelationshipKind]) -> Self {
        let mut tally = Tally::default();
        for kind in path {
            match kind.lineage() {
                Lineage::Ascend => tally.up += 1,
                Lineage::Descend => tally.down += 1,
                Lineage::Marriage => tally.marriages += 1,
                Lineage::Sibling => {}
            }
        }
        tally
    }
}

/// Generations climbed to and descended from the closest common ancestor
///
/// Only defined for blood paths that climb first and descend afterwards. Sibling
/// steps are lateral; when the climb ends on a sibling step the path crosses the peak
/// through the shared parent, which counts as one extra generation up and down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Peak {
    up: u32,
    down: u32,
}

impl Peak {
    fn of(path: &[RelationshipKind]) -> Option<Self> {
        let mut up = 0;
        let mut down = 0;
        let mut crossed_by_sibling = false;

        for kind in path {
            match kind.lineage() {
                Lineage::Marriage => return None,
                Lineage::Ascend => {
                    if down > 0 {
                        return None;
                    }
                    up += 1;
                    crossed_by_sibling = false;
                }
                Lineage::Sibling => {
                    if down == 0 {
                        crossed_by_sibling = true;
                    }
                }
                Lineage::Descend => down += 1,
            }
        }

        if crossed_by_sibling {
            up += 1;
            down += 1;
        }

        Some(Peak { up, down })
    }
}

/// Calculate the relationship described by `path`
///
/// `end_gender` selects the gendered term for the last person; a final `FatherOf` or
/// `MotherOf` step overrides it. `_start_gender` is accepted for symmetry with callers
/// that always know both endpoints.
///
/// # Examples
///
/// ```
/// use kinship_domain::{calculate_relationship, Gender, RelationshipKind};
///
/// let path = [RelationshipKind::FatherOf, RelationshipKind::FatherOf];
/// let result = calculate_relationship(&path, Gender::Female, Gender::Male);
/// assert_eq!(result.description, "paternal grandfather");
/// assert_eq!(result.genetic_similarity, 25.0);
/// ```
pub fn calculate_relationship(
    path: &[RelationshipKind],
    _start_gender: Gender,
    end_gender: Gender,
) -> RelationshipResult {
    if path.is_empty() {
        return RelationshipResult {
            description: "yourself".to_string(),
            category: RelationshipCategory::Immediate,
            generations_up: 0,
            generations_down: 0,
            is_blood_relation: true,
            genetic_similarity: MAX_GENETIC_SIMILARITY,
        };
    }

    let end_gender = path
        .last()
        .and_then(|kind| kind.implied_gender())
        .unwrap_or(end_gender);
    let tally = Tally::of(path);
    let peak = Peak::of(path);

    let description = match peak {
        Some(peak) => describe_blood(path, peak, end_gender),
        None if tally.marriages > 0 => describe_in_law(path, end_gender),
        None => describe_generations(tally),
    };

    RelationshipResult {
        description,
        category: categorize(tally, peak),
        generations_up: tally.up,
        generations_down: tally.down,
        is_blood_relation: tally.marriages == 0,
        genetic_similarity: genetic_similarity(tally),
    }
}

/// Match the cousin pattern of a path
///
/// Returns `None` unless the path is a blood path over a common ancestor at least two
/// generations above both ends.
///
/// ```
/// use kinship_domain::{match_cousin, CousinDegree, RelationshipKind::*};
///
/// let path = [ParentOf, ParentOf, ParentOf, ChildOf, ChildOf];
/// assert_eq!(match_cousin(&path), Some(CousinDegree { degree: 1, removal: 1 }));
/// assert_eq!(match_cousin(&[ParentOf, SiblingOf]), None);
/// ```
pub fn match_cousin(path: &[RelationshipKind]) -> Option<CousinDegree> {
    let peak = Peak::of(path)?;
    let degree = peak.up.min(peak.down).checked_sub(1)?;
    if degree == 0 {
        return None;
    }
    Some(CousinDegree {
        degree,
        removal: peak.up.abs_diff(peak.down),
    })
}

fn describe_blood(path: &[RelationshipKind], peak: Peak, gender: Gender) -> String {
    let side = side_prefix(path);

    match (peak.up, peak.down) {
        (0, 0) => "relative".to_string(),
        (1, 0) => gender.pick("father", "mother", "parent").to_string(),
        (up, 0) => format!("{}{}", side, ancestor(up, gender)),
        (0, 1) => gender.pick("son", "daughter", "child").to_string(),
        (0, down) => descendant(down, gender),
        (1, 1) => gender.pick("brother", "sister", "sibling").to_string(),
        (up, 1) => format!(
            "{}{}{}",
            side,
            greats(up - 2),
            gender.pick("uncle", "aunt", "aunt/uncle")
        ),
        (1, down) => {
            let base = gender.pick("nephew", "niece", "nibling");
            match down {
                2 => base.to_string(),
                _ => format!("{}grand{}", greats(down - 3), base),
            }
        }
        (up, down) => cousin(CousinDegree {
            degree: up.min(down) - 1,
            removal: up.abs_diff(down),
        }),
    }
}

fn describe_in_law(path: &[RelationshipKind], gender: Gender) -> String {
    use RelationshipKind::*;

    match path {
        [SpouseOf] => gender.pick("husband", "wife", "spouse").to_string(),
        [SpouseOf, parent] if parent.is_parent() => {
            gender.pick("father-in-law", "mother-in-law", "parent-in-law").to_string()
        }
        [ChildOf, SpouseOf] => gender
            .pick("son-in-law", "daughter-in-law", "child-in-law")
            .to_string(),
        [SpouseOf, SiblingOf] | [SiblingOf, SpouseOf] => {
            gender.pick("brother-in-law", "sister-in-law", "sibling-in-law").to_string()
        }
        [parent, SpouseOf] if parent.is_parent() => {
            gender.pick("stepfather", "stepmother", "step-parent").to_string()
        }
        [SpouseOf, ChildOf] => gender.pick("stepson", "stepdaughter", "stepchild").to_string(),
        _ => "relative by marriage".to_string(),
    }
}

fn describe_generations(tally: Tally) -> String {
    match (tally.up, tally.down) {
        (0, 0) => "relative".to_string(),
        (up, 0) => format!("ancestor ({} generation{} up)", up, plural(up)),
        (0, down) => format!("descendant ({} generation{} down)", down, plural(down)),
        (up, down) => format!("distant relative ({} up, {} down)", up, down),
    }
}

/// "paternal " or "maternal " when the path starts at a father or mother
fn side_prefix(path: &[RelationshipKind]) -> &'static str {
    match path.first() {
        Some(RelationshipKind::FatherOf) => "paternal ",
        Some(RelationshipKind::MotherOf) => "maternal ",
        _ => "",
    }
}

fn ancestor(up: u32, gender: Gender) -> String {
    format!(
        "{}{}",
        greats(up.saturating_sub(2)),
        gender.pick("grandfather", "grandmother", "grandparent")
    )
}

fn descendant(down: u32, gender: Gender) -> String {
    format!(
        "{}{}",
        greats(down.saturating_sub(2)),
        gender.pick("grandson", "granddaughter", "grandchild")
    )
}

fn greats(n: u32) -> String {
    "great-".repeat(n as usize)
}

fn cousin(CousinDegree { degree, removal }: CousinDegree) -> String {
    match (degree, removal) {
        (1, 0) => "cousin".to_string(),
        (1, 1) => "first cousin once removed".to_string(),
        (1, 2) => "first cousin twice removed".to_string(),
        (2, 0) => "second cousin".to_string(),
        (2, 1) => "second cousin once removed".to_string(),
        (3, 0) => "third cousin".to_string(),
        _ => {
            let removed = match removal {
                0 => String::new(),
                1 => " once removed".to_string(),
                2 => " twice removed".to_string(),
                n => format!(" {} times removed", n),
            };
            format!("{} cousin{}", ordinal(degree), removed)
        }
    }
}

fn ordinal(n: u32) -> String {
    match n {
        1 => "first".to_string(),
        2 => "second".to_string(),
        3 => "third".to_string(),
        n => {
            let suffix = match (n % 10, n % 100) {
                (_, 11..=13) => "th",
                (1, _) => "st",
                (2, _) => "nd",
                (3, _) => "rd",
                _ => "th",
            };
            format!("{}{}", n, suffix)
        }
    }
}

fn plural(n: u32) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn categorize(tally: Tally, peak: Option<Peak>) -> RelationshipCategory {
    if tally.marriages > 0 && tally.up == 0 && tally.down == 0 {
        return RelationshipCategory::NonBlood;
    }

    let (up, down) = match peak {
        Some(peak) => (peak.up, peak.down),
        None => (tally.up, tally.down),
    };

    if up <= 1 && down <= 1 {
        RelationshipCategory::Immediate
    } else if up <= 2 && down <= 2 {
        RelationshipCategory::Extended
    } else {
        RelationshipCategory::Distant
    }
}

/// Shared-ancestry heuristic
///
/// Halves per generation of edge distance. This is an approximation, not a
/// coefficient of relationship: it ignores pedigree collapse and multiple common
/// ancestors.
fn genetic_similarity(tally: Tally) -> f64 {
    if tally.marriages > 0 {
        return 0.0;
    }

    match tally.up + tally.down {
        0 | 1 => MAX_GENETIC_SIMILARITY,
        2 => 25.0,
        distance => {
            let similarity = MAX_GENETIC_SIMILARITY / 2f64.powi(distance as i32 - 1);
            similarity.clamp(MIN_GENETIC_SIMILARITY, MAX_GENETIC_SIMILARITY)
        }
    }
}
