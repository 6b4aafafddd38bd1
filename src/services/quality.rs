//! 题目质量评分
//!
//! 将 IRT 原始参数映射到 0-10 刻度并计算综合质量指数。纯函数，可重复调用。

use crate::models::{IrtParameters, QuestionStatistics, ScaledParameters, round_to};

/// 缺省猜测参数（2PL 结果没有 c）
pub const DEFAULT_GUESSING: f64 = 0.25;

const DISCRIMINATION_WEIGHT: f64 = 1.0;
const DIFFICULTY_WEIGHT: f64 = 0.5;
const GUESSING_WEIGHT: f64 = 2.0;

/// 写入统计信息的公式说明
pub const QUALITY_FORMULA: &str = "scaled_difficulty = clamp(0, 10, (b + 6) * 10/12); \
scaled_discrimination = clamp(0, 10, a * 2.5); \
scaled_guessing = 10 - c * 10 (c defaults to 0.25); \
raw_quality = 1.0*a - 0.5*|b| - 2.0*c; \
quality_score = clamp(0, 10, (raw_quality + 3) * 10/6)";

fn clamp_scale(value: f64) -> f64 {
    value.clamp(0.0, 10.0)
}

/// 由 IRT 参数计算刻度指标
pub fn scale_parameters(irt: &IrtParameters) -> ScaledParameters {
    let b = irt.difficulty;
    let a = irt.discrimination;
    let c = irt.guessing.unwrap_or(DEFAULT_GUESSING);

    let raw_quality = DISCRIMINATION_WEIGHT * a - DIFFICULTY_WEIGHT * b.abs() - GUESSING_WEIGHT * c;

    ScaledParameters {
        scaled_difficulty: round_to(clamp_scale((b + 6.0) * (10.0 / 12.0)), 2),
        scaled_discrimination: round_to(clamp_scale(a * 2.5), 2),
        scaled_guessing: round_to(10.0 - c * 10.0, 2),
        raw_quality: round_to(raw_quality, 4),
        quality_score: round_to(clamp_scale((raw_quality + 3.0) * (10.0 / 6.0)), 2),
        formula: QUALITY_FORMULA.to_string(),
    }
}

/// 为统计信息附加刻度指标
///
/// 没有 IRT 参数时原样返回。原始参数不会被修改。
pub fn score_statistics(statistics: &QuestionStatistics) -> QuestionStatistics {
    score_with_parameters(statistics, statistics.irt_parameters.as_ref())
}

/// 按给定的 IRT 参数计算刻度指标
///
/// 标定流程传入未舍入的拟合值，`statistics.irt_parameters` 保持存储时的精度。
pub fn score_with_parameters(
    statistics: &QuestionStatistics,
    irt: Option<&IrtParameters>,
) -> QuestionStatistics {
    let mut scored = statistics.clone();
    scored.scaled_parameters = irt.map(scale_parameters);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassicalParameters;
    use rstest::rstest;

    fn irt(b: f64, a: f64, c: Option<f64>) -> IrtParameters {
        IrtParameters {
            difficulty: b,
            discrimination: a,
            guessing: c,
        }
    }

    #[test]
    fn test_reference_item_scores_six() {
        let scaled = scale_parameters(&irt(0.0, 1.0, Some(0.2)));
        assert_eq!(scaled.scaled_difficulty, 5.0);
        assert_eq!(scaled.scaled_discrimination, 2.5);
        assert_eq!(scaled.scaled_guessing, 8.0);
        assert!((scaled.raw_quality - 0.6).abs() < 1e-12);
        assert_eq!(scaled.quality_score, 6.0);
    }

    #[rstest]
    #[case(-6.0, 0.0)]
    #[case(6.0, 10.0)]
    #[case(-20.0, 0.0)]
    #[case(20.0, 10.0)]
    #[case(0.0, 5.0)]
    fn test_difficulty_boundaries(#[case] b: f64, #[case] expected: f64) {
        assert_eq!(scale_parameters(&irt(b, 1.0, None)).scaled_difficulty, expected);
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(2.0, 5.0)]
    #[case(4.0, 10.0)]
    #[case(9.0, 10.0)]
    fn test_discrimination_boundaries(#[case] a: f64, #[case] expected: f64) {
        assert_eq!(
            scale_parameters(&irt(0.0, a, None)).scaled_discrimination,
            expected
        );
    }

    #[rstest]
    #[case(irt(10.0, 0.0, Some(1.0)))]
    #[case(irt(-10.0, 6.0, Some(0.0)))]
    #[case(irt(0.0, 100.0, None))]
    #[case(irt(3.3, 0.01, Some(0.5)))]
    fn test_scores_stay_in_range(#[case] params: IrtParameters) {
        let scaled = scale_parameters(&params);
        for value in [
            scaled.scaled_difficulty,
            scaled.scaled_discrimination,
            scaled.quality_score,
        ] {
            assert!((0.0..=10.0).contains(&value), "{} out of range", value);
        }
    }

    #[test]
    fn test_missing_guessing_defaults_to_quarter() {
        let scaled = scale_parameters(&irt(0.0, 1.0, None));
        assert_eq!(scaled.scaled_guessing, 7.5);
        assert!((scaled.raw_quality - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_statistics_without_irt_unchanged() {
        let stats = QuestionStatistics {
            classical_parameters: ClassicalParameters::new(2, 3),
            ..QuestionStatistics::default()
        };
        assert_eq!(score_statistics(&stats), stats);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let stats = QuestionStatistics {
            classical_parameters: ClassicalParameters::new(2, 3),
            irt_parameters: Some(irt(1.2, 0.8, Some(0.1))),
            ..QuestionStatistics::default()
        };
        let once = score_statistics(&stats);
        let twice = score_statistics(&once);

        assert_eq!(once, twice);
        assert_eq!(once.irt_parameters, stats.irt_parameters);
        assert!(once.scaled_parameters.unwrap().formula.contains("raw_quality"));
    }

    #[test]
    fn test_explicit_parameters_drive_scaled_values() {
        let stored = irt(0.0, 1.0, Some(0.2));
        let stats = QuestionStatistics {
            classical_parameters: ClassicalParameters::new(2, 3),
            irt_parameters: Some(stored),
            ..QuestionStatistics::default()
        };
        let precise = irt(0.0, 1.0003, Some(0.2));

        let scored = score_with_parameters(&stats, Some(&precise));
        let scaled = scored.scaled_parameters.unwrap();
        assert!((scaled.raw_quality - 0.6).abs() > 1e-5);
        assert_eq!(scaled, scale_parameters(&precise));
        assert_eq!(scored.irt_parameters, Some(stored));

        assert!(score_with_parameters(&stats, None).scaled_parameters.is_none());
    }
}
