//! 牌型變體展開
//!
//! 一個牌型定義展開為多個具體的 14 張變體：
//! 同號點數 x 連號起點 x 多選點數 x 花色排列。
//! 每個變體附帶逐位置的 Joker 可用旗標，供 Engine 1 做位置化的 Joker 分配。

use std::collections::HashSet;

use serde::Serialize;

use super::constants::HAND_TILE_COUNT;
use super::pattern::{GroupDef, PatternDef, PatternId, TileValue};
use super::tiles::{Dragon, Suit, Tile, Wind};
use crate::error::CorpusError;

/// 牌型的一個具體變體（載入後不可變）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PatternVariation {
    pub pattern_id: PatternId,
    pub year: u16,
    pub section: String,
    pub line: u16,
    /// 同一牌型內從 1 起算的序號
    pub sequence: u32,
    pub tiles: [Tile; HAND_TILE_COUNT],
    pub jokers_allowed: [bool; HAND_TILE_COUNT],
    pub points: u32,
    pub concealed: bool,
}

impl PatternVariation {
    /// 某種牌在此變體中可用 Joker 的位置數
    pub fn joker_slots(&self, tile: Tile) -> u8 {
        self.tiles
            .iter()
            .zip(self.jokers_allowed.iter())
            .filter(|(t, allowed)| **allowed && t.same_kind(tile))
            .count() as u8
    }

    /// 此變體是否用到某種牌
    pub fn requires(&self, tile: Tile) -> bool {
        self.tiles.iter().any(|t| t.same_kind(tile))
    }
}

/// 單一組合下各組的取值
struct Assignment<'a> {
    like: Option<u8>,
    run_start: Option<u8>,
    choices: &'a [u8],
    suits: [Option<Suit>; 3],
}

/// 將牌型定義展開為所有變體
///
/// 任何組定義不合法或展開後不是 14 張，整個牌型即失敗。
pub fn expand(def: &PatternDef, default_year: u16) -> Result<Vec<PatternVariation>, CorpusError> {
    let invalid = |group: usize, reason: &str| CorpusError::InvalidGroup {
        pattern: def.key.clone(),
        group,
        reason: reason.to_string(),
    };

    if def.groups.is_empty() {
        return Err(invalid(0, "pattern has no groups"));
    }

    let like_options: Vec<Option<u8>> = if def.groups.iter().any(|g| g.value == TileValue::Like) {
        (1..=9).map(Some).collect()
    } else {
        vec![None]
    };

    let max_offset = def
        .groups
        .iter()
        .filter_map(|g| match g.value {
            TileValue::Run(k) => Some(k),
            _ => None,
        })
        .max();
    let run_options: Vec<Option<u8>> = match max_offset {
        Some(k) if k > 8 => {
            let idx = def
                .groups
                .iter()
                .position(|g| g.value == TileValue::Run(k))
                .unwrap_or(0);
            return Err(invalid(idx, "run offset leaves no room for a start rank"));
        }
        Some(k) => (1..=9 - k).map(Some).collect(),
        None => vec![None],
    };

    // 多選點數的笛卡兒積
    let mut choice_combos: Vec<Vec<u8>> = vec![Vec::new()];
    for (idx, group) in def.groups.iter().enumerate() {
        if let TileValue::Choice(values) = &group.value {
            if values.is_empty() {
                return Err(invalid(idx, "empty number choice"));
            }
            choice_combos = choice_combos
                .into_iter()
                .flat_map(|combo| {
                    values.iter().map(move |&v| {
                        let mut next = combo.clone();
                        next.push(v);
                        next
                    })
                })
                .collect();
        }
    }

    let mut roles: Vec<usize> = def.groups.iter().filter_map(|g| g.suit.index()).collect();
    roles.sort_unstable();
    roles.dedup();
    let permutations = suit_permutations(roles.len());

    let year = def.year.unwrap_or(default_year);
    let mut seen: HashSet<Vec<Tile>> = HashSet::new();
    let mut variations = Vec::new();

    for &like in &like_options {
        for &run_start in &run_options {
            for choices in &choice_combos {
                for perm in &permutations {
                    let mut suits = [None; 3];
                    for (role, suit) in roles.iter().zip(perm.iter()) {
                        suits[*role] = Some(*suit);
                    }
                    let assignment = Assignment {
                        like,
                        run_start,
                        choices,
                        suits,
                    };

                    let mut tiles = Vec::with_capacity(HAND_TILE_COUNT);
                    let mut jokers = Vec::with_capacity(HAND_TILE_COUNT);
                    let mut choice_cursor = 0;
                    for (idx, group) in def.groups.iter().enumerate() {
                        let choice = if matches!(group.value, TileValue::Choice(_)) {
                            choice_cursor += 1;
                            assignment.choices.get(choice_cursor - 1).copied()
                        } else {
                            None
                        };
                        let expanded =
                            group_tiles(group, &assignment, choice).map_err(|r| invalid(idx, &r))?;
                        jokers.extend(std::iter::repeat(group.jokers_allowed()).take(expanded.len()));
                        tiles.extend(expanded);
                    }

                    let count = tiles.len();
                    let (Ok(tiles), Ok(jokers_allowed)) = (
                        <[Tile; HAND_TILE_COUNT]>::try_from(tiles),
                        <[bool; HAND_TILE_COUNT]>::try_from(jokers),
                    ) else {
                        return Err(CorpusError::TileCount {
                            pattern: def.key.clone(),
                            count,
                        });
                    };

                    let mut key: Vec<Tile> = tiles
                        .iter()
                        .map(|t| Tile::from_kind_index(t.kind_index()).unwrap_or(*t))
                        .collect();
                    key.sort_unstable();
                    if !seen.insert(key) {
                        continue;
                    }

                    variations.push(PatternVariation {
                        pattern_id: def.id(),
                        year,
                        section: def.section.clone(),
                        line: def.line,
                        sequence: variations.len() as u32 + 1,
                        tiles,
                        jokers_allowed,
                        points: def.points,
                        concealed: def.concealed,
                    });
                }
            }
        }
    }

    Ok(variations)
}

/// 一組展開後的牌
fn group_tiles(group: &GroupDef, assignment: &Assignment, choice: Option<u8>) -> Result<Vec<Tile>, String> {
    let suit = group.suit.index().and_then(|i| assignment.suits[i]);

    match group.kind.size() {
        Some(size) => {
            let tile = single_tile(&group.value, suit, assignment, choice)?;
            Ok(vec![tile; size])
        }
        None => match &group.value {
            TileValue::Winds => Ok(vec![
                Tile::Wind(Wind::North),
                Tile::Wind(Wind::East),
                Tile::Wind(Wind::West),
                Tile::Wind(Wind::South),
            ]),
            TileValue::Dragons => Ok(Dragon::all().iter().map(|d| Tile::Dragon(*d)).collect()),
            TileValue::Digits(digits) => digits
                .chars()
                .map(|c| -> Result<Tile, String> {
                    match c {
                        '0' => Ok(Tile::Dragon(Dragon::White)),
                        '1'..='9' => {
                            let suit = suit.ok_or("digits need a suit role")?;
                            Ok(Tile::number(suit, c as u8 - b'0'))
                        }
                        _ => Err(format!("invalid digit {c:?}")),
                    }
                })
                .collect(),
            _ => Err("sequence groups take winds, dragons or digits".to_string()),
        },
    }
}

/// 相同牌組的單張牌
fn single_tile(
    value: &TileValue,
    suit: Option<Suit>,
    assignment: &Assignment,
    choice: Option<u8>,
) -> Result<Tile, String> {
    let numbered = |rank: Option<u8>| -> Result<Tile, String> {
        let rank = rank.ok_or("number value could not be resolved")?;
        if !(1..=9).contains(&rank) {
            return Err(format!("rank {rank} out of range"));
        }
        let suit = suit.ok_or("numbered group needs a suit role")?;
        Ok(Tile::number(suit, rank))
    };

    match value {
        TileValue::Number(n) => numbered(Some(*n)),
        TileValue::Choice(_) => numbered(choice),
        TileValue::Like => numbered(assignment.like),
        TileValue::Run(k) => numbered(assignment.run_start.map(|s| s + k)),
        TileValue::Flower => Ok(Tile::FLOWER),
        TileValue::Wind(w) => Ok(Tile::Wind(*w)),
        TileValue::Dragon(d) => Ok(Tile::Dragon(*d)),
        TileValue::MatchingDragon => {
            let suit = suit.ok_or("matching dragon needs a suit role")?;
            Ok(Tile::Dragon(Dragon::matching(suit)))
        }
        TileValue::Winds | TileValue::Dragons | TileValue::Digits(_) => {
            Err("multi-tile value needs a sequence group".to_string())
        }
    }
}

/// 從三門花色中取 k 個的所有排列（k = 0 時為單一空排列）
fn suit_permutations(k: usize) -> Vec<Vec<Suit>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for prefix in suit_permutations(k - 1) {
        for suit in Suit::all() {
            if !prefix.contains(suit) {
                let mut next = prefix.clone();
                next.push(*suit);
                out.push(next);
            }
        }
    }
    out
}

// ============================================================================
// 單元測試
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::pattern::{Difficulty, GroupKind, SuitRole};

    fn group(kind: GroupKind, value: TileValue, suit: SuitRole) -> GroupDef {
        GroupDef {
            kind,
            value,
            suit,
            jokers: None,
        }
    }

    fn pattern(key: &str, groups: Vec<GroupDef>) -> PatternDef {
        PatternDef {
            year: None,
            section: "TEST".into(),
            line: 1,
            key: key.into(),
            display: key.into(),
            description: String::new(),
            points: 25,
            difficulty: Difficulty::Medium,
            concealed: false,
            groups,
        }
    }

    #[test]
    fn test_suit_permutations() {
        assert_eq!(suit_permutations(0).len(), 1);
        assert_eq!(suit_permutations(1).len(), 3);
        assert_eq!(suit_permutations(2).len(), 6);
        assert_eq!(suit_permutations(3).len(), 6);
    }

    #[test]
    fn test_expand_winds_has_single_variation() {
        let def = pattern(
            "NEWS",
            vec![
                group(GroupKind::Kong, TileValue::Wind(Wind::North), SuitRole::None),
                group(GroupKind::Pung, TileValue::Wind(Wind::East), SuitRole::None),
                group(GroupKind::Pung, TileValue::Wind(Wind::West), SuitRole::None),
                group(GroupKind::Kong, TileValue::Wind(Wind::South), SuitRole::None),
            ],
        );
        let vars = expand(&def, 2025).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].sequence, 1);
        assert_eq!(vars[0].year, 2025);
        assert!(vars[0].jokers_allowed.iter().all(|&j| j));
    }

    #[test]
    fn test_expand_like_numbers_across_suits() {
        // FF 1111 1111 1111
        let def = pattern(
            "LIKE",
            vec![
                group(GroupKind::Pair, TileValue::Flower, SuitRole::None),
                group(GroupKind::Kong, TileValue::Like, SuitRole::First),
                group(GroupKind::Kong, TileValue::Like, SuitRole::Second),
                group(GroupKind::Kong, TileValue::Like, SuitRole::Third),
            ],
        );
        let vars = expand(&def, 2025).unwrap();
        // 九個點數；三門花色的排列互為同一多重集合，去重後每個點數只剩一個
        assert_eq!(vars.len(), 9);
        assert!(!vars[0].jokers_allowed[0]);
        assert!(vars[0].jokers_allowed[2]);
        let seqs: Vec<u32> = vars.iter().map(|v| v.sequence).collect();
        assert_eq!(seqs, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn test_expand_consecutive_run() {
        // 11 222 3333 444 55 單一花色
        let def = pattern(
            "RUN",
            vec![
                group(GroupKind::Pair, TileValue::Run(0), SuitRole::First),
                group(GroupKind::Pung, TileValue::Run(1), SuitRole::First),
                group(GroupKind::Kong, TileValue::Run(2), SuitRole::First),
                group(GroupKind::Pung, TileValue::Run(3), SuitRole::First),
                group(GroupKind::Pair, TileValue::Run(4), SuitRole::First),
            ],
        );
        let vars = expand(&def, 2025).unwrap();
        // 起點 1..=5，三門花色
        assert_eq!(vars.len(), 15);
        let first = &vars[0];
        assert_eq!(first.tiles[0], Tile::number(Suit::Dots, 1));
        assert_eq!(first.tiles[13], Tile::number(Suit::Dots, 5));
    }

    #[test]
    fn test_expand_digits_and_choice() {
        // FF 2025 + kong (2|4) + pung matching dragon
        let def = pattern(
            "YEAR",
            vec![
                group(GroupKind::Pair, TileValue::Flower, SuitRole::None),
                group(GroupKind::Sequence, TileValue::Digits("2025".into()), SuitRole::First),
                group(GroupKind::Kong, TileValue::Choice(vec![2, 4]), SuitRole::Second),
                group(GroupKind::Kong, TileValue::MatchingDragon, SuitRole::Second),
            ],
        );
        let vars = expand(&def, 2025).unwrap();
        assert_eq!(vars.len(), 2 * 6);
        let v = &vars[0];
        assert_eq!(v.tiles[3], Tile::Dragon(Dragon::White));
        assert!(!v.jokers_allowed[2], "sequence positions take no jokers");
        assert_eq!(v.joker_slots(v.tiles[13]), 4);
        assert!(v.requires(Tile::Flower(3)));
    }

    #[test]
    fn test_expand_rejects_wrong_tile_count() {
        let def = pattern(
            "SHORT",
            vec![group(GroupKind::Kong, TileValue::Flower, SuitRole::None)],
        );
        assert!(matches!(
            expand(&def, 2025),
            Err(CorpusError::TileCount { count: 4, .. })
        ));
    }

    #[test]
    fn test_expand_rejects_numbers_without_suit() {
        let def = pattern(
            "NOSUIT",
            vec![group(GroupKind::Pung, TileValue::Number(3), SuitRole::None)],
        );
        assert!(matches!(
            expand(&def, 2025),
            Err(CorpusError::InvalidGroup { group: 0, .. })
        ));
    }

    #[test]
    fn test_expand_rejects_sequence_value_mismatch() {
        let def = pattern(
            "BADSEQ",
            vec![group(GroupKind::Sequence, TileValue::Flower, SuitRole::None)],
        );
        assert!(expand(&def, 2025).is_err());

        let def = pattern(
            "BADKONG",
            vec![group(GroupKind::Kong, TileValue::Winds, SuitRole::None)],
        );
        assert!(expand(&def, 2025).is_err());
    }
}
