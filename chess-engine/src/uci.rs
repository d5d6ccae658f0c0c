//! UCI 输出行解析
//!
//! 只处理适配器关心的子集：`uciok`、`readyok`、带 `cp` 的 `info` 行
//! 和终止行 `bestmove <move> [ponder <move>]`。

use protocol::Move;

/// 引擎输出的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    UciOk,
    ReadyOk,
    /// 搜索进度
    Info(InfoLine),
    /// 搜索结束；`(none)` 或缺失记号时为 `None`
    BestMove(Option<Move>),
    /// 其他行（id、option、info string 等）
    Other,
}

/// `info` 行中与评估相关的字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InfoLine {
    pub depth: Option<u32>,
    pub multipv: Option<u32>,
    /// 以走子方视角的厘兵分
    pub cp: Option<i32>,
    pub mate: Option<i32>,
}

/// 解析一行引擎输出
pub fn parse_line(line: &str) -> EngineLine {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("uciok") => EngineLine::UciOk,
        Some("readyok") => EngineLine::ReadyOk,
        Some("bestmove") => EngineLine::BestMove(tokens.next().and_then(parse_move_token)),
        Some("info") => parse_info(tokens),
        _ => EngineLine::Other,
    }
}

fn parse_move_token(token: &str) -> Option<Move> {
    if token == "(none)" || token == "0000" {
        return None;
    }
    match Move::parse(token) {
        Ok(mv) => Some(mv),
        Err(e) => {
            tracing::warn!("无法解析的 bestmove 走法 {:?}: {}", token, e);
            None
        }
    }
}

fn parse_info<'a>(mut tokens: impl Iterator<Item = &'a str>) -> EngineLine {
    let mut info = InfoLine::default();

    while let Some(token) = tokens.next() {
        match token {
            // info string 之后是自由文本
            "string" => return EngineLine::Other,
            "depth" => info.depth = tokens.next().and_then(|v| v.parse().ok()),
            "multipv" => info.multipv = tokens.next().and_then(|v| v.parse().ok()),
            "cp" => info.cp = tokens.next().and_then(|v| v.parse().ok()),
            "mate" => info.mate = tokens.next().and_then(|v| v.parse().ok()),
            // 主变例排在最后，其中不会再有评估字段
            "pv" => break,
            _ => {}
        }
    }

    EngineLine::Info(info)
}

/// 记录搜索过程中最深一层的评估分
///
/// 同一深度以后出现的为准；没有 `depth` 的行视为深度 0。
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreTracker {
    best: Option<(u32, i32)>,
}

impl ScoreTracker {
    pub fn observe(&mut self, info: &InfoLine) {
        // 只看主变例
        if info.multipv.is_some_and(|n| n > 1) {
            return;
        }
        let Some(cp) = info.cp else {
            return;
        };

        let depth = info.depth.unwrap_or(0);
        if self.best.is_none_or(|(d, _)| depth >= d) {
            self.best = Some((depth, cp));
        }
    }

    /// 最深一层的评估分，未观察到时为 0
    pub fn score(&self) -> i32 {
        self.best.map(|(_, cp)| cp).unwrap_or(0)
    }

    pub fn depth(&self) -> Option<u32> {
        self.best.map(|(d, _)| d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_lines() {
        assert_eq!(parse_line("uciok"), EngineLine::UciOk);
        assert_eq!(parse_line("readyok  "), EngineLine::ReadyOk);
        assert_eq!(parse_line("id name Stockfish 16"), EngineLine::Other);
    }

    #[test]
    fn test_bestmove() {
        assert_eq!(
            parse_line("bestmove e2e4 ponder e7e5"),
            EngineLine::BestMove(Some(Move::parse("e2e4").unwrap()))
        );
        assert_eq!(
            parse_line("bestmove e7e8q"),
            EngineLine::BestMove(Some(Move::parse("E7E8q").unwrap()))
        );
        assert_eq!(parse_line("bestmove (none)"), EngineLine::BestMove(None));
        assert_eq!(parse_line("bestmove"), EngineLine::BestMove(None));
    }

    #[test]
    fn test_info_line() {
        let line = "info depth 12 seldepth 18 multipv 1 score cp -35 nodes 1234 nps 99 pv e7e5 g1f3";
        match parse_line(line) {
            EngineLine::Info(info) => {
                assert_eq!(info.depth, Some(12));
                assert_eq!(info.cp, Some(-35));
                assert_eq!(info.mate, None);
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse_line("info depth 20 score mate 3 pv h5f7") {
            EngineLine::Info(info) => {
                assert_eq!(info.cp, None);
                assert_eq!(info.mate, Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(parse_line("info string NNUE cp 100"), EngineLine::Other);
    }

    #[test]
    fn test_score_tracker_prefers_deepest() {
        let mut tracker = ScoreTracker::default();
        assert_eq!(tracker.score(), 0);

        for (depth, cp) in [(1, 40), (2, 12), (3, 25)] {
            tracker.observe(&InfoLine {
                depth: Some(depth),
                cp: Some(cp),
                ..InfoLine::default()
            });
        }
        assert_eq!(tracker.score(), 25);

        // 较浅深度的迟到输出不会覆盖
        tracker.observe(&InfoLine {
            depth: Some(2),
            cp: Some(-300),
            ..InfoLine::default()
        });
        assert_eq!(tracker.score(), 25);
        assert_eq!(tracker.depth(), Some(3));

        // 次优变例忽略
        tracker.observe(&InfoLine {
            depth: Some(3),
            multipv: Some(2),
            cp: Some(-80),
            ..InfoLine::default()
        });
        assert_eq!(tracker.score(), 25);
    }
}
