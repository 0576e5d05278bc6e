use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::errors::{ErpError, ServiceResult};
use crate::models::{FeePayment, PaymentStatus};
use crate::services::{DataGateway, Query, Table, select_as};

pub const ALL: &str = "all";

pub const RECEIPT_TITLE: &str = "EDUFLOW ERP - FEE RECEIPT";
pub const RECEIPT_FOOTER: &str = "Thank you for your payment.";
pub const RECEIPT_MIME_TYPE: &str = "text/plain";
const RULE_WIDTH: usize = 50;

/// Ledger filters; `all` or an empty value leaves a dimension unconstrained.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeFilter {
    #[serde(default, alias = "search")]
    pub search_term: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub semester: String,
}

fn unconstrained(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(ALL)
}

impl FeeFilter {
    fn matches(&self, payment: &FeePayment) -> bool {
        let term = self.search_term.trim().to_lowercase();
        let search_hit = term.is_empty()
            || [
                Some(payment.student_name.as_str()),
                Some(payment.student_email.as_str()),
                payment.student_roll_no.as_deref(),
                payment.receipt_number.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&term));

        search_hit
            && (unconstrained(&self.status) || payment.payment_status.as_str() == self.status.trim())
            && (unconstrained(&self.course) || payment.course == self.course.trim())
            && (unconstrained(&self.semester) || payment.semester == self.semester.trim())
    }
}

/// All payments, newest first.
pub async fn fetch_payments<G>(gateway: &G) -> ServiceResult<Vec<FeePayment>>
where
    G: DataGateway + ?Sized,
{
    let query = Query::new().order_by("created_at", true);
    select_as(gateway, Table::FeePayments, &query).await
}

pub fn filter(rows: &[FeePayment], criteria: &FeeFilter) -> Vec<FeePayment> {
    rows.iter()
        .filter(|payment| criteria.matches(payment))
        .cloned()
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FeeTotals {
    pub collected: f64,
    pub pending: f64,
    pub overdue: f64,
}

/// Sums over whatever set is passed in; callers pass the filtered rows.
pub fn aggregate(rows: &[FeePayment]) -> FeeTotals {
    rows.iter().fold(FeeTotals::default(), |mut totals, payment| {
        match payment.payment_status {
            PaymentStatus::Paid => totals.collected += payment.paid_amount,
            PaymentStatus::Pending | PaymentStatus::Partial => totals.pending += payment.balance_amount,
            PaymentStatus::Overdue => totals.overdue += payment.balance_amount,
            PaymentStatus::Cancelled => {}
        }
        totals
    })
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub courses: Vec<String>,
    pub semesters: Vec<String>,
}

pub fn filter_options(rows: &[FeePayment]) -> FilterOptions {
    let courses: BTreeSet<_> = rows.iter().map(|p| p.course.clone()).collect();
    let semesters: BTreeSet<_> = rows.iter().map(|p| p.semester.clone()).collect();
    FilterOptions {
        courses: courses.into_iter().collect(),
        semesters: semesters.into_iter().collect(),
    }
}

/// A downloadable plain-text receipt.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Receipt {
    pub file_name: String,
    pub mime_type: &'static str,
    pub body: String,
}

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("N/A")
}

pub fn generate_receipt(payment: &FeePayment) -> ServiceResult<Receipt> {
    let receipt_number = payment
        .receipt_number
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ErpError::MissingReceiptNumber)?;

    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let payment_date = payment
        .payment_date
        .map(|d| d.format("%Y-%m-%d").to_string());

    let mut body = String::new();
    let lines = [
        RECEIPT_TITLE.to_string(),
        heavy.clone(),
        format!("Receipt Number: {receipt_number}"),
        format!("Payment Date: {}", or_na(payment_date.as_deref())),
        light.clone(),
        format!("Student Name: {}", payment.student_name),
        format!("Student Email: {}", payment.student_email),
        format!("Roll Number: {}", or_na(payment.student_roll_no.as_deref())),
        format!("Course: {}", payment.course),
        format!("Semester: {}", payment.semester),
        format!("Academic Year: {}", payment.academic_year),
        light,
        format!("Fee Type: {}", payment.fee_type),
        format!("Fee Category: {}", payment.fee_category),
        format!("Description: {}", or_na(payment.description.as_deref())),
        format!("Total Amount: {:.2}", payment.amount),
        format!("Paid Amount: {:.2}", payment.paid_amount),
        format!("Balance Amount: {:.2}", payment.balance_amount),
        format!("Payment Status: {}", payment.payment_status.as_str().to_uppercase()),
        format!("Payment Method: {}", or_na(payment.payment_method.as_deref())),
        format!("Payment Reference: {}", or_na(payment.payment_reference.as_deref())),
        heavy,
        RECEIPT_FOOTER.to_string(),
    ];
    for line in lines {
        let _ = writeln!(body, "{line}");
    }

    Ok(Receipt {
        file_name: format!("receipt_{receipt_number}.txt"),
        mime_type: RECEIPT_MIME_TYPE,
        body,
    })
}

pub async fn find_payment<G>(gateway: &G, id: &str) -> ServiceResult<FeePayment>
where
    G: DataGateway + ?Sized,
{
    crate::services::first_as(
        gateway,
        Table::FeePayments,
        crate::services::Filter::new().eq("id", id),
    )
    .await?
    .ok_or_else(|| ErpError::NotFound(format!("payment {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn payment(name: &str, course: &str, status: PaymentStatus, paid: f64, balance: f64) -> FeePayment {
        let now = Utc::now();
        FeePayment {
            id: format!("fp-{name}"),
            student_id: format!("st-{name}"),
            student_name: name.into(),
            student_email: format!("{}@college.edu", name.to_lowercase()),
            student_roll_no: Some(format!("{course}-042")),
            course: course.into(),
            semester: "3".into(),
            academic_year: "2024-2025".into(),
            fee_type: "Tuition Fee".into(),
            fee_category: "Academic".into(),
            amount: paid + balance,
            paid_amount: paid,
            balance_amount: balance,
            payment_status: status,
            payment_method: None,
            payment_reference: None,
            payment_date: None,
            due_date: NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
            description: None,
            receipt_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ledger() -> Vec<FeePayment> {
        vec![
            payment("Asha", "CS", PaymentStatus::Paid, 1000.0, 0.0),
            payment("Bram", "CS", PaymentStatus::Pending, 0.0, 500.0),
            payment("Cleo", "EE", PaymentStatus::Overdue, 0.0, 200.0),
        ]
    }

    #[test]
    fn totals_follow_the_filtered_set() {
        let rows = ledger();
        let all = filter(&rows, &FeeFilter::default());
        assert_eq!(all.len(), 3);
        assert_eq!(
            aggregate(&all),
            FeeTotals {
                collected: 1000.0,
                pending: 500.0,
                overdue: 200.0
            }
        );

        let cs_only = filter(
            &rows,
            &FeeFilter {
                course: "CS".into(),
                ..FeeFilter::default()
            },
        );
        assert_eq!(aggregate(&cs_only).overdue, 0.0);
    }

    #[test]
    fn filters_combine_with_and() {
        let rows = ledger();
        let criteria = FeeFilter {
            status: "paid".into(),
            course: "CS".into(),
            semester: ALL.into(),
            ..FeeFilter::default()
        };
        let hits = filter(&rows, &criteria);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].student_name, "Asha");

        let none = FeeFilter {
            status: "paid".into(),
            course: "EE".into(),
            ..FeeFilter::default()
        };
        assert!(filter(&rows, &none).is_empty());
    }

    #[test]
    fn search_matches_any_identity_field() {
        let mut rows = ledger();
        rows[2].receipt_number = Some("R-777".into());
        let by_receipt = FeeFilter {
            search_term: "r-777".into(),
            ..FeeFilter::default()
        };
        assert_eq!(filter(&rows, &by_receipt)[0].student_name, "Cleo");
        let by_email = FeeFilter {
            search_term: "BRAM@".into(),
            ..FeeFilter::default()
        };
        assert_eq!(filter(&rows, &by_email).len(), 1);
    }

    #[test]
    fn receipt_requires_number() {
        let rows = ledger();
        assert!(matches!(
            generate_receipt(&rows[0]),
            Err(ErpError::MissingReceiptNumber)
        ));
    }

    #[test]
    fn receipt_layout() {
        let mut paid = ledger().remove(0);
        paid.receipt_number = Some("R-100".into());
        paid.payment_method = Some("Card".into());
        let receipt = generate_receipt(&paid).unwrap();
        assert_eq!(receipt.file_name, "receipt_R-100.txt");
        assert_eq!(receipt.mime_type, "text/plain");

        let lines: Vec<&str> = receipt.body.lines().collect();
        assert_eq!(lines[0], RECEIPT_TITLE);
        assert_eq!(lines[2], "Receipt Number: R-100");
        assert_eq!(lines[5], "Student Name: Asha");
        assert!(lines.contains(&"Total Amount: 1000.00"));
        assert!(lines.contains(&"Paid Amount: 1000.00"));
        assert!(lines.contains(&"Balance Amount: 0.00"));
        assert!(lines.contains(&"Payment Method: Card"));
        assert_eq!(lines.last(), Some(&RECEIPT_FOOTER));
    }

    #[test]
    fn options_are_sorted_and_distinct() {
        let options = filter_options(&ledger());
        assert_eq!(options.courses, vec!["CS", "EE"]);
        assert_eq!(options.semesters, vec!["3"]);
    }
}
