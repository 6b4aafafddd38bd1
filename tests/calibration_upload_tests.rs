// Integration tests for the result upload pipeline
//
// Workbooks are generated in memory with rust_xlsxwriter and pushed through
// CalibrationService against the in-memory repositories.

use std::sync::Arc;

use mcq_analytics::config::CalibrationConfig;
use mcq_analytics::error::AppError;
use mcq_analytics::irt::IrtModel;
use mcq_analytics::models::{Question, Test};
use mcq_analytics::services::CalibrationService;
use mcq_analytics::storage::memory::{
    MemoryQuestionRepository, MemoryTestRepository, MemoryTestResultRepository,
};
use mcq_analytics::storage::repository::{
    QuestionRepository, TestRepository, TestResultRepository,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Beta, Distribution, StandardNormal};
use rust_xlsxwriter::Workbook;

const ITEMS: usize = 5;

struct Fixture {
    service: CalibrationService,
    questions: Arc<MemoryQuestionRepository>,
    results: Arc<MemoryTestResultRepository>,
}

async fn fixture() -> Fixture {
    fixture_with(CalibrationConfig::default()).await
}

async fn fixture_with(config: CalibrationConfig) -> Fixture {
    let questions = Arc::new(MemoryQuestionRepository::new());
    let tests = Arc::new(MemoryTestRepository::new());
    let results = Arc::new(MemoryTestResultRepository::new());

    let ids: Vec<String> = (1..=ITEMS).map(|i| format!("q{}", i)).collect();
    for id in &ids {
        questions
            .create(Question::new(id, "bank", &format!("Question {}", id)))
            .await
            .unwrap();
    }
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    tests
        .create(Test::new("midterm", "Midterm", &id_refs).unwrap())
        .await
        .unwrap();

    let service = CalibrationService::new(
        questions.clone(),
        tests,
        results.clone(),
        config,
    );
    Fixture {
        service,
        questions,
        results,
    }
}

/// 模拟作答：版本 A 印刷题号 1-5 依次对应试卷题目，
/// 版本 B 使用题号 6-10 且顺序颠倒
fn simulated_answers(students: usize, seed: u64) -> Vec<(char, Vec<u8>)> {
    simulated_answers_with_guessing(students, seed, [0.0; ITEMS])
}

fn simulated_answers_with_guessing(
    students: usize,
    seed: u64,
    guessing: [f64; ITEMS],
) -> Vec<(char, Vec<u8>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let discrimination = [0.8, 1.2, 1.5, 1.0, 1.3];
    let difficulty = [-1.5, -0.5, 0.0, 0.7, 1.4];

    (0..students)
        .map(|s| {
            let theta: f64 = rng.sample(StandardNormal);
            let answers = (0..ITEMS)
                .map(|j| {
                    let p = guessing[j]
                        + (1.0 - guessing[j])
                            / (1.0 + (-discrimination[j] * (theta - difficulty[j])).exp());
                    u8::from(rng.gen_bool(p))
                })
                .collect();
            (if s % 2 == 0 { 'A' } else { 'B' }, answers)
        })
        .collect()
}

fn printed_number(version: char, canonical: usize) -> usize {
    match version {
        'A' => canonical + 1,
        _ => 10 - canonical,
    }
}

fn build_workbook(students: &[(char, Vec<u8>)], mapping_rows: &[[&str; 3]]) -> Vec<u8> {
    let mut workbook = Workbook::new();

    let answers = workbook.add_worksheet();
    answers.set_name("Answers").unwrap();
    answers.write_string(0, 0, "Student").unwrap();
    for number in 1..=10u16 {
        answers
            .write_string(0, number, format!("Q{}", number))
            .unwrap();
    }
    for (row, (version, responses)) in students.iter().enumerate() {
        let row = row as u32 + 1;
        answers
            .write_string(row, 0, format!("S{:04}", row))
            .unwrap();
        for (canonical, &correct) in responses.iter().enumerate() {
            let col = printed_number(*version, canonical) as u16;
            // 作答码以 1 结尾为答对
            let code = if correct == 1 { "A1" } else { "A0" };
            answers.write_string(row, col, code).unwrap();
        }
    }

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_string(0, 0, "exported from scanner").unwrap();

    let mapping = workbook.add_worksheet();
    mapping.set_name("Mapping").unwrap();
    for (col, header) in ["order", "A", "B"].iter().enumerate() {
        mapping.write_string(0, col as u16, *header).unwrap();
    }
    for (row, cells) in mapping_rows.iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            if let Ok(number) = cell.parse::<f64>() {
                mapping
                    .write_number(row as u32 + 1, col as u16, number)
                    .unwrap();
            }
        }
    }

    workbook.save_to_buffer().unwrap()
}

const FULL_MAPPING: [[&str; 3]; ITEMS] = [
    ["1", "1", "10"],
    ["2", "2", "9"],
    ["3", "3", "8"],
    ["4", "4", "7"],
    ["5", "5", "6"],
];

#[tokio::test]
async fn test_upload_stores_results_and_statistics() {
    let fx = fixture().await;
    let students = simulated_answers(600, 21);
    let file = build_workbook(&students, &FULL_MAPPING);

    let summary = fx
        .service
        .calibrate_upload("midterm", file, Some(IrtModel::TwoPl))
        .await
        .unwrap();

    assert_eq!(summary.results_count, 600);
    assert_eq!(summary.dropped_rows, 0);
    assert_eq!(summary.model_used, IrtModel::TwoPl);
    assert!(summary.irt_calculated, "fit failed: {:?}", summary.error);
    assert!(summary.error.is_none());

    let stored = fx.results.list_by_test("midterm").await.unwrap();
    assert_eq!(stored.len(), 600);
    assert!(stored.iter().any(|r| r.version == "A"));
    assert!(stored.iter().any(|r| r.version == "B"));

    // 版本 B 的作答必须被还原到试卷顺序
    let expected_correct = (0..ITEMS)
        .map(|j| students.iter().filter(|(_, a)| a[j] == 1).count() as u64)
        .collect::<Vec<_>>();
    for (j, expected) in expected_correct.iter().enumerate() {
        let question = fx
            .questions
            .get_by_id(&format!("q{}", j + 1))
            .await
            .unwrap()
            .unwrap();
        let statistics = question.statistics.unwrap();
        assert_eq!(statistics.classical_parameters.correct_responses, *expected);
        assert_eq!(statistics.classical_parameters.total_responses, 600);
        let irt = statistics.irt_parameters.expect("2PL parameters stored");
        assert!(irt.guessing.is_none());
        assert!(irt.discrimination > 0.0);
        let scaled = statistics.scaled_parameters.expect("scaled values stored");
        assert!((0.0..=10.0).contains(&scaled.quality_score));
        assert!(statistics.error.is_none());
    }
}

#[tokio::test]
async fn test_three_pl_upload_stores_guessing() {
    // 3PL 的猜测参数收敛较慢
    let fx = fixture_with(CalibrationConfig {
        max_em_cycles: 2000,
        ..CalibrationConfig::default()
    })
    .await;
    let mut rng = StdRng::seed_from_u64(41);
    let beta = Beta::new(5.0, 17.0).unwrap();
    let mut guessing = [0.0; ITEMS];
    for c in guessing.iter_mut() {
        *c = beta.sample(&mut rng);
    }
    let file = build_workbook(
        &simulated_answers_with_guessing(1500, 43, guessing),
        &FULL_MAPPING,
    );

    let summary = fx
        .service
        .calibrate_upload("midterm", file, Some(IrtModel::ThreePl))
        .await
        .unwrap();

    assert_eq!(summary.model_used, IrtModel::ThreePl);
    assert!(summary.irt_calculated, "fit failed: {:?}", summary.error);

    for j in 1..=ITEMS {
        let question = fx
            .questions
            .get_by_id(&format!("q{}", j))
            .await
            .unwrap()
            .unwrap();
        let statistics = question.statistics.unwrap();
        let irt = statistics.irt_parameters.expect("3PL parameters stored");
        let c = irt.guessing.expect("3PL stores a guessing parameter");
        assert!((0.0..=1.0).contains(&c), "q{} guessing {}", j, c);
        assert!(statistics.scaled_parameters.is_some());
    }
}

#[tokio::test]
async fn test_easier_items_have_higher_p_values() {
    let fx = fixture().await;
    let file = build_workbook(&simulated_answers(800, 5), &FULL_MAPPING);
    fx.service
        .calibrate_upload("midterm", file, None)
        .await
        .unwrap();

    let easiest = fx.questions.get_by_id("q1").await.unwrap().unwrap();
    let hardest = fx.questions.get_by_id("q5").await.unwrap().unwrap();
    let p_easy = easiest.statistics.unwrap().classical_parameters.p_value;
    let p_hard = hardest.statistics.unwrap().classical_parameters.p_value;
    assert!(p_easy > p_hard, "p(q1)={} p(q5)={}", p_easy, p_hard);
}

#[tokio::test]
async fn test_incomplete_mapping_is_rejected_before_writes() {
    let fx = fixture().await;
    let mapping = [
        ["1", "1", "10"],
        ["2", "2", "9"],
        ["3", "3", "8"],
        ["4", "4", ""],
        ["5", "5", ""],
    ];
    let file = build_workbook(&simulated_answers(50, 1), &mapping);

    let err = fx
        .service
        .calibrate_upload("midterm", file, None)
        .await
        .unwrap_err();

    match err {
        AppError::MappingCountMismatch { expected, actual } => {
            assert_eq!(expected, ITEMS);
            assert!(actual.iter().any(|v| v.version == "B" && v.count == 3));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fx.results.count_by_test("midterm").await.unwrap(), 0);
    let q1 = fx.questions.get_by_id("q1").await.unwrap().unwrap();
    assert!(q1.statistics.is_none());
}

#[tokio::test]
async fn test_unknown_test_is_not_found() {
    let fx = fixture().await;
    let file = build_workbook(&simulated_answers(10, 3), &FULL_MAPPING);

    let err = fx
        .service
        .calibrate_upload("final", file, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_workbook_without_mapping_sheet() {
    let fx = fixture().await;
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Q1").unwrap();
    sheet.write_string(1, 0, "1").unwrap();
    let file = workbook.save_to_buffer().unwrap();

    let err = fx
        .service
        .calibrate_upload("midterm", file, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Spreadsheet(_)));
}
