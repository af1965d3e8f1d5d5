use crate::bands::GradeBander;
use crate::weights::{AssessmentCategory, WeightProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub student_id: String,
    pub category: AssessmentCategory,
    pub score: f64,
    pub max_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter_grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPercentage {
    pub category: AssessmentCategory,
    pub percentage: f64,
    #[serde(default)]
    pub score_total: f64,
    #[serde(default)]
    pub max_total: f64,
    #[serde(default)]
    pub record_count: usize,
    /// Records exist but their max scores sum to 0.
    #[serde(default)]
    pub degenerate: bool,
}

pub type CategoryPercentages = BTreeMap<AssessmentCategory, CategoryPercentage>;

/// Finite inputs whose totals or quotient overflow `f64`. JSON has no way
/// to carry such a result, so it is rejected instead of reported.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("{category} percentage is not a finite number (score total {score_total}, max total {max_total})")]
    NonFinitePercentage {
        category: AssessmentCategory,
        score_total: f64,
        max_total: f64,
    },
    #[error("weighted overall percentage is not a finite number")]
    NonFiniteOverall,
    #[error("student {student_id}: {source}")]
    Student {
        student_id: String,
        source: Box<CalcError>,
    },
}

/// Collapses one student's records into a percentage per category.
///
/// Scores and max scores are summed within a category before dividing, so
/// two tests of 5/10 and 20/20 give 83.3%, not the 75% mean of their
/// percentages. Categories with no records are left out of the map.
pub fn aggregate<'a, I>(records: I) -> Result<CategoryPercentages, CalcError>
where
    I: IntoIterator<Item = &'a ScoreRecord>,
{
    let mut sums: BTreeMap<AssessmentCategory, (f64, f64, usize)> = BTreeMap::new();
    for r in records {
        let entry = sums.entry(r.category).or_insert((0.0, 0.0, 0));
        entry.0 += r.score;
        entry.1 += r.max_score;
        entry.2 += 1;
    }

    sums.into_iter()
        .map(|(category, (score_total, max_total, record_count))| {
            let degenerate = max_total == 0.0;
            if !score_total.is_finite() || !max_total.is_finite() {
                return Err(CalcError::NonFinitePercentage {
                    category,
                    score_total,
                    max_total,
                });
            }
            let percentage = if degenerate {
                tracing::warn!(
                    category = %category,
                    record_count,
                    "category has records but zero total max score; treating as 0%"
                );
                0.0
            } else {
                100.0 * score_total / max_total
            };
            if !percentage.is_finite() {
                return Err(CalcError::NonFinitePercentage {
                    category,
                    score_total,
                    max_total,
                });
            }
            Ok((
                category,
                CategoryPercentage {
                    category,
                    percentage,
                    score_total,
                    max_total,
                    record_count,
                    degenerate,
                },
            ))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedCategory {
    pub category: AssessmentCategory,
    pub percentage: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallGrade {
    /// `None` when no weighted category has data. Not the same as 0.
    pub overall_percentage: Option<f64>,
    pub letter_grade: Option<String>,
    pub total_weight: f64,
    pub categories: Vec<WeightedCategory>,
}

/// Weighted mean over the categories that have data.
///
/// Categories missing from `categories` drop out of both numerator and
/// denominator; the letter is left empty for the caller (or
/// [`grade_student`]) to fill in.
pub fn compute_overall(
    categories: &CategoryPercentages,
    profile: &WeightProfile,
) -> Result<OverallGrade, CalcError> {
    let mut weighted_sum = 0.0_f64;
    let mut total_weight = 0.0_f64;
    let mut breakdown: Vec<WeightedCategory> = Vec::with_capacity(categories.len());

    for (category, cp) in categories {
        let weight = profile.weight(*category);
        weighted_sum += cp.percentage * weight;
        total_weight += weight;
        breakdown.push(WeightedCategory {
            category: *category,
            percentage: cp.percentage,
            weight,
        });
    }

    let overall_percentage = if total_weight > 0.0 {
        let pct = weighted_sum / total_weight;
        if !pct.is_finite() {
            return Err(CalcError::NonFiniteOverall);
        }
        Some(pct)
    } else {
        None
    };

    Ok(OverallGrade {
        overall_percentage,
        letter_grade: None,
        total_weight,
        categories: breakdown,
    })
}

pub fn band_overall(mut grade: OverallGrade, bander: &dyn GradeBander) -> OverallGrade {
    grade.letter_grade = grade
        .overall_percentage
        .map(|pct| bander.band(pct).to_string());
    grade
}

pub fn grade_student<'a, I>(
    records: I,
    profile: &WeightProfile,
    bander: &dyn GradeBander,
) -> Result<OverallGrade, CalcError>
where
    I: IntoIterator<Item = &'a ScoreRecord>,
{
    let categories = aggregate(records)?;
    Ok(band_overall(compute_overall(&categories, profile)?, bander))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGrade {
    pub student_id: String,
    #[serde(flatten)]
    pub grade: OverallGrade,
    pub degenerate_categories: Vec<AssessmentCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterCount {
    pub letter: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSubjectSummary {
    pub student_count: usize,
    pub graded_count: usize,
    pub ungraded_count: usize,
    pub distribution: Vec<LetterCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSubjectGrades {
    pub students: Vec<StudentGrade>,
    pub summary: ClassSubjectSummary,
}

/// Grades every student that appears in `records`, each independently.
/// Rows come back sorted by student id. One student's overflowing data
/// fails the whole batch.
pub fn grade_class_subject<'a, I>(
    records: I,
    profile: &WeightProfile,
    bander: &dyn GradeBander,
) -> Result<ClassSubjectGrades, CalcError>
where
    I: IntoIterator<Item = &'a ScoreRecord>,
{
    let mut by_student: BTreeMap<&str, Vec<&ScoreRecord>> = BTreeMap::new();
    for r in records {
        by_student.entry(r.student_id.as_str()).or_default().push(r);
    }

    let mut students: Vec<StudentGrade> = Vec::with_capacity(by_student.len());
    for (student_id, rows) in by_student {
        let for_student = |source| CalcError::Student {
            student_id: student_id.to_string(),
            source: Box::new(source),
        };
        let categories = aggregate(rows.iter().copied()).map_err(for_student)?;
        let degenerate_categories = categories
            .values()
            .filter(|c| c.degenerate)
            .map(|c| c.category)
            .collect();
        let overall = compute_overall(&categories, profile).map_err(for_student)?;
        let grade = band_overall(overall, bander);
        students.push(StudentGrade {
            student_id: student_id.to_string(),
            grade,
            degenerate_categories,
        });
    }

    let mut distribution: Vec<LetterCount> = bander
        .letters()
        .into_iter()
        .map(|letter| LetterCount { letter, count: 0 })
        .collect();
    let mut graded_count = 0;
    for s in &students {
        let Some(letter) = s.grade.letter_grade.as_deref() else {
            continue;
        };
        graded_count += 1;
        match distribution.iter_mut().find(|d| d.letter == letter) {
            Some(slot) => slot.count += 1,
            None => distribution.push(LetterCount {
                letter: letter.to_string(),
                count: 1,
            }),
        }
    }

    let student_count = students.len();
    Ok(ClassSubjectGrades {
        students,
        summary: ClassSubjectSummary {
            student_count,
            graded_count,
            ungraded_count: student_count - graded_count,
            distribution,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::BandTable;
    use crate::weights::{CategoryWeights, DefaultWeightTable};
    use proptest::prelude::*;
    use AssessmentCategory::*;

    fn rec(student: &str, category: AssessmentCategory, score: f64, max: f64) -> ScoreRecord {
        ScoreRecord {
            student_id: student.to_string(),
            category,
            score,
            max_score: max,
            letter_grade: None,
            remarks: None,
        }
    }

    fn profile(pairs: &[(AssessmentCategory, f64)]) -> WeightProfile {
        WeightProfile::commit(pairs.iter().copied().collect::<CategoryWeights>()).expect("valid profile")
    }

    #[test]
    fn multiple_records_are_summed_not_averaged() {
        let records = vec![rec("s1", Test, 5.0, 10.0), rec("s1", Test, 20.0, 20.0)];
        let out = aggregate(&records).expect("finite");
        let test = &out[&Test];
        assert!((test.percentage - 250.0 / 3.0).abs() < 1e-9);
        assert_eq!(test.record_count, 2);
        assert_eq!(test.max_total, 30.0);
        assert!(!test.degenerate);
    }

    #[test]
    fn absent_categories_are_not_in_the_map() {
        let records = vec![rec("s1", Homework, 0.0, 10.0)];
        let out = aggregate(&records).expect("finite");
        assert_eq!(out.len(), 1);
        assert_eq!(out[&Homework].percentage, 0.0);
        assert!(!out.contains_key(&Exam));
    }

    #[test]
    fn zero_max_score_is_present_at_zero_percent() {
        let records = vec![rec("s1", Quiz, 4.0, 0.0), rec("s1", Exam, 9.0, 10.0)];
        let out = aggregate(&records).expect("finite");
        assert!(out[&Quiz].degenerate);
        assert_eq!(out[&Quiz].percentage, 0.0);

        let p = profile(&[(Quiz, 50.0), (Exam, 50.0)]);
        let g = compute_overall(&out, &p).expect("finite");
        assert_eq!(g.total_weight, 100.0);
        assert_eq!(g.overall_percentage, Some(45.0));
    }

    #[test]
    fn concrete_scenario_renormalizes_to_74_b() {
        let p = profile(&[(Homework, 20.0), (Test, 30.0), (Exam, 50.0)]);
        let records = vec![rec("s1", Homework, 8.0, 10.0), rec("s1", Test, 21.0, 30.0)];
        let cats = aggregate(&records).expect("finite");
        assert_eq!(cats.len(), 2);
        let g = compute_overall(&cats, &p).expect("finite");
        assert_eq!(g.total_weight, 50.0);
        assert!((g.overall_percentage.expect("graded") - 74.0).abs() < 1e-9);
        assert_eq!(
            g.categories,
            vec![
                WeightedCategory { category: Homework, percentage: 80.0, weight: 20.0 },
                WeightedCategory { category: Test, percentage: 70.0, weight: 30.0 },
            ]
        );

        let banded = grade_student(&records, &p, &BandTable::standard()).expect("finite");
        assert_eq!(banded.letter_grade.as_deref(), Some("B"));
    }

    #[test]
    fn unassessed_category_weight_does_not_move_the_result() {
        let records = vec![rec("s1", Homework, 80.0, 100.0), rec("s1", Test, 60.0, 100.0)];
        let cats = aggregate(&records).expect("finite");

        let before = profile(&[(Homework, 50.0), (Test, 50.0)]);
        let after = profile(&[(Homework, 40.0), (Test, 40.0), (Project, 20.0)]);
        let a = compute_overall(&cats, &before)
            .expect("finite")
            .overall_percentage
            .expect("graded");
        let b = compute_overall(&cats, &after)
            .expect("finite")
            .overall_percentage
            .expect("graded");
        assert!((a - 70.0).abs() < 1e-9);
        assert!((b - 70.0).abs() < 1e-9);
    }

    #[test]
    fn zero_weight_present_category_is_a_no_op() {
        let p = profile(&[(Homework, 50.0), (Test, 50.0)]);
        let with_quiz = vec![
            rec("s1", Homework, 9.0, 10.0),
            rec("s1", Test, 7.0, 10.0),
            rec("s1", Quiz, 0.0, 10.0),
        ];
        let g = compute_overall(&aggregate(&with_quiz).expect("finite"), &p).expect("finite");
        assert!((g.overall_percentage.expect("graded") - 80.0).abs() < 1e-9);
        assert_eq!(g.categories.len(), 3);

        let only_quiz = vec![rec("s1", Quiz, 10.0, 10.0)];
        let g = grade_student(&only_quiz, &p, &BandTable::standard()).expect("finite");
        assert_eq!(g.total_weight, 0.0);
        assert_eq!(g.overall_percentage, None);
        assert_eq!(g.letter_grade, None);
    }

    #[test]
    fn no_records_is_ungraded_not_zero() {
        let p = DefaultWeightTable::standard().profile().clone();
        let g = grade_student(std::iter::empty(), &p, &BandTable::standard()).expect("finite");
        assert!(g.overall_percentage.is_none());
        assert_eq!(g.letter_grade, None);
        assert!(g.categories.is_empty());
    }

    struct PanickingBander;

    impl GradeBander for PanickingBander {
        fn band(&self, _percentage: f64) -> &str {
            panic!("banding must not run for ungraded results");
        }
    }

    #[test]
    fn ungraded_results_never_reach_the_bander() {
        let p = DefaultWeightTable::standard().profile().clone();
        let g = grade_student(std::iter::empty(), &p, &PanickingBander).expect("finite");
        assert_eq!(g.overall_percentage, None);
    }

    #[test]
    fn class_subject_grades_students_independently() {
        let p = profile(&[(Homework, 20.0), (Test, 30.0), (Exam, 50.0)]);
        let records = vec![
            rec("b", Exam, 30.0, 100.0),
            rec("a", Homework, 8.0, 10.0),
            rec("a", Test, 21.0, 30.0),
            rec("c", Quiz, 5.0, 5.0),
            rec("d", Homework, 3.0, 0.0),
        ];
        let out = grade_class_subject(&records, &p, &BandTable::standard()).expect("finite");
        let ids: Vec<&str> = out.students.iter().map(|s| s.student_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(out.students[0].grade.letter_grade.as_deref(), Some("B"));
        assert_eq!(out.students[1].grade.letter_grade.as_deref(), Some("F"));
        assert_eq!(out.students[2].grade.overall_percentage, None);
        assert_eq!(out.students[3].grade.overall_percentage, Some(0.0));
        assert_eq!(out.students[3].degenerate_categories, vec![Homework]);

        assert_eq!(out.summary.student_count, 4);
        assert_eq!(out.summary.graded_count, 3);
        assert_eq!(out.summary.ungraded_count, 1);
        let count = |l: &str| {
            out.summary
                .distribution
                .iter()
                .find(|d| d.letter == l)
                .map(|d| d.count)
        };
        assert_eq!(count("B"), Some(1));
        assert_eq!(count("F"), Some(2));
        assert_eq!(count("A"), Some(0));
    }

    #[test]
    fn overflowing_category_totals_are_rejected() {
        let records = vec![rec("s1", Exam, 1e308, 1e308), rec("s1", Exam, 1e308, 1e308)];
        assert!(matches!(
            aggregate(&records),
            Err(CalcError::NonFinitePercentage { category: Exam, .. })
        ));

        let tiny_max = vec![rec("s1", Exam, 1e308, 1e-10)];
        assert!(matches!(
            aggregate(&tiny_max),
            Err(CalcError::NonFinitePercentage { category: Exam, .. })
        ));

        let p = profile(&[(Exam, 100.0)]);
        assert!(grade_student(&tiny_max, &p, &PanickingBander).is_err());
    }

    #[test]
    fn overflowing_weighted_sum_is_rejected_not_ungraded() {
        let mut cats = CategoryPercentages::new();
        for category in [Homework, Test] {
            cats.insert(
                category,
                CategoryPercentage {
                    category,
                    percentage: 1e307,
                    score_total: 0.0,
                    max_total: 0.0,
                    record_count: 1,
                    degenerate: false,
                },
            );
        }
        let p = profile(&[(Homework, 50.0), (Test, 50.0)]);
        assert_eq!(compute_overall(&cats, &p), Err(CalcError::NonFiniteOverall));
    }

    #[test]
    fn class_batch_names_the_student_with_overflowing_data() {
        let p = profile(&[(Exam, 100.0)]);
        let records = vec![rec("a", Exam, 7.0, 10.0), rec("b", Exam, 1e308, 1e-10)];
        let err = grade_class_subject(&records, &p, &BandTable::standard()).expect_err("overflow");
        match err {
            CalcError::Student { student_id, source } => {
                assert_eq!(student_id, "b");
                assert!(matches!(*source, CalcError::NonFinitePercentage { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    struct PassFail;

    impl GradeBander for PassFail {
        fn band(&self, percentage: f64) -> &str {
            if percentage >= 50.0 {
                "PASS"
            } else {
                "FAIL"
            }
        }
    }

    #[test]
    fn distribution_counts_letters_the_bander_does_not_list() {
        let p = profile(&[(Exam, 100.0)]);
        let records = vec![
            rec("a", Exam, 9.0, 10.0),
            rec("b", Exam, 2.0, 10.0),
            rec("c", Exam, 6.0, 10.0),
        ];
        let out = grade_class_subject(&records, &p, &PassFail).expect("finite");
        assert_eq!(
            out.summary.distribution,
            vec![
                LetterCount { letter: "PASS".to_string(), count: 2 },
                LetterCount { letter: "FAIL".to_string(), count: 1 },
            ]
        );
        assert_eq!(out.summary.graded_count, 3);
    }

    fn record_strategy(category: AssessmentCategory) -> impl Strategy<Value = ScoreRecord> {
        (0.0f64..50.0, 1.0f64..50.0).prop_map(move |(score, max)| rec("s", category, score, max))
    }

    proptest! {
        #[test]
        fn category_result_ignores_other_categories(
            tests in prop::collection::vec(record_strategy(Test), 1..6),
            exams in prop::collection::vec(record_strategy(Exam), 0..6),
        ) {
            let alone = aggregate(&tests).expect("finite");
            let mixed: Vec<ScoreRecord> = tests.iter().chain(exams.iter()).cloned().collect();
            let together = aggregate(&mixed).expect("finite");
            prop_assert_eq!(&alone[&Test], &together[&Test]);
        }

        #[test]
        fn overall_is_invariant_to_weight_of_ungraded_categories(
            a in 0.0f64..100.0,
            b in 0.0f64..100.0,
            extra in 0.0f64..90.0,
        ) {
            let records = vec![rec("s", Homework, a, 100.0), rec("s", Test, b, 100.0)];
            let cats = aggregate(&records).expect("finite");
            let half = (100.0 - extra) / 2.0;
            let p = profile(&[(Homework, half), (Test, half), (Exam, extra)]);
            let got = compute_overall(&cats, &p)
                .expect("finite")
                .overall_percentage
                .expect("graded");
            prop_assert!((got - (a + b) / 2.0).abs() < 1e-6);
        }
    }
}
