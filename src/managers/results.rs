use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RankedOption {
    pub name: String,
    pub votes: u32,
    pub percentage: u32,
}

/// Ranked view of one ledger snapshot. Rebuilt from scratch on every change.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub ranked: Vec<RankedOption>,
    pub total_votes: u32,
}

impl PollResults {
    /// Options missing from `counts` count as zero. Ties keep option order.
    pub fn tally(options: &[String], counts: &[u32]) -> Self {
        let mut ranked: Vec<(String, u32)> = options
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), counts.get(index).copied().unwrap_or(0)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let total_votes: u32 = ranked.iter().map(|(_, votes)| votes).sum();
        let ranked = ranked
            .into_iter()
            .map(|(name, votes)| RankedOption {
                percentage: percentage(votes, total_votes),
                name,
                votes,
            })
            .collect();
        Self { ranked, total_votes }
    }

    pub fn winner(&self) -> Option<&RankedOption> {
        if self.total_votes == 0 {
            return None;
        }
        self.ranked.first()
    }
}

/// Rounded half up. The sum over all options may miss 100 by rounding.
fn percentage(votes: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (votes, total) = (u64::from(votes), u64::from(total));
    ((votes * 200 + total) / (total * 2)) as u32
}

impl fmt::Display for PollResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self
            .ranked
            .iter()
            .map(|option| format!("{} {} ({}%)", option.name, option.votes, option.percentage))
            .collect();
        write!(f, "{} | total {}", rows.join(", "), self.total_votes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn options(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn ranks_by_votes_with_winner() {
        let results = PollResults::tally(&options(&["Red", "Blue"]), &[1, 2]);
        assert_eq!(results.total_votes, 3);
        let winner = results.winner().unwrap();
        assert_eq!(winner.name, "Blue");
        assert_eq!(winner.percentage, 67);
        assert_snapshot!(results.to_string(), @"Blue 2 (67%), Red 1 (33%) | total 3");
    }

    #[test]
    fn no_votes_means_no_winner() {
        let results = PollResults::tally(&options(&["Red", "Blue"]), &[0, 0]);
        assert_eq!(results.winner(), None);
        assert!(results.ranked.iter().all(|option| option.percentage == 0));
    }

    #[test]
    fn ties_keep_option_order() {
        let results = PollResults::tally(&options(&["a", "b", "c"]), &[1, 1, 1]);
        let names: Vec<&str> = results.ranked.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        // 33 + 33 + 33, rounding is not corrected
        let sum: u32 = results.ranked.iter().map(|o| o.percentage).sum();
        assert_eq!(sum, 99);
    }

    #[test]
    fn short_snapshot_counts_as_zero() {
        let results = PollResults::tally(&options(&["a", "b", "c"]), &[0, 4]);
        assert_snapshot!(results.to_string(), @"b 4 (100%), a 0 (0%), c 0 (0%) | total 4");
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(1, 200), 1);
        assert_eq!(percentage(1, 201), 0);
    }
}
