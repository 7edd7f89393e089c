//! CSV downloads of the point history and the withdrawal audit. Files carry a
//! UTF-8 BOM so spreadsheet tools pick up the Korean headers.

use chrono::{DateTime, Utc};
use csv::Writer;

use crate::error::AppError;
use crate::kst;
use crate::ledger::audit::AuditRow;
use crate::ledger::history::LedgerEntry;

const BOM: &str = "\u{feff}";

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String, AppError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::InternalError(format!("CSV 작성 실패: {}", e)))?;
    let body = String::from_utf8(bytes).map_err(|e| AppError::InternalError(e.to_string()))?;
    Ok(format!("{}{}", BOM, body))
}

pub fn history_csv(entries: &[LedgerEntry]) -> Result<String, AppError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(["날짜", "시간", "크리에이터", "이메일", "유형", "포인트", "사유", "캠페인", "DB"])?;
    for entry in entries {
        let local = entry.created_at.with_timezone(&kst());
        writer.write_record([
            local.format("%Y-%m-%d").to_string(),
            local.format("%H:%M:%S").to_string(),
            entry.creator_name.clone(),
            entry.creator_email.clone(),
            if entry.amount > 0 { "지급" } else { "차감" }.to_string(),
            entry.amount.to_string(),
            entry.description.clone().unwrap_or_default(),
            entry.campaign_title.clone().unwrap_or_default(),
            entry.source.label().to_string(),
        ])?;
    }
    finish(writer)
}

pub fn audit_csv(rows: &[AuditRow]) -> Result<String, AppError> {
    if rows.is_empty() {
        return Err(AppError::UnprocessableEntity("다운로드할 데이터가 없습니다.".to_string()));
    }
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record([
        "신청일",
        "크리에이터",
        "이메일",
        "리전",
        "상태",
        "신청 포인트",
        "실제 잔액 (creator_points)",
        "캐시 잔액 (featured_creators)",
        "잔액 차이",
        "처리중 출금 합계",
        "초과 여부",
        "캐시 불일치",
        "중복 의심",
    ])?;
    for row in rows {
        writer.write_record([
            row.created_at.with_timezone(&kst()).format("%Y-%m-%d").to_string(),
            row.creator_name.clone(),
            row.creator_email.clone().unwrap_or_default(),
            row.creator_region.clone().unwrap_or_default(),
            row.status.clone(),
            row.requested_points.to_string(),
            row.actual_balance.to_string(),
            row.cached_balance.to_string(),
            row.balance_diff.to_string(),
            row.total_pending.to_string(),
            yes_no(row.is_overpaid).to_string(),
            yes_no(row.balance_mismatch).to_string(),
            yes_no(row.is_duplicate).to_string(),
        ])?;
    }
    finish(writer)
}

/// `Content-Disposition` value with a dated, percent-encoded Korean file name.
pub fn attachment(prefix: &str, now: DateTime<Utc>) -> String {
    let name = format!("{}_{}.csv", prefix, now.with_timezone(&kst()).format("%Y%m%d"));
    let encoded: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    format!("attachment; filename=\"export.csv\"; filename*=UTF-8''{}", encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SourceDb;
    use uuid::Uuid;

    fn entry(amount: i64) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            creator_id: None,
            amount,
            transaction_type: "admin_add".to_string(),
            description: Some("이벤트, \"특별\" 지급".to_string()),
            campaign_id: None,
            campaign_title: None,
            creator_name: "이하늘".to_string(),
            creator_email: "sky@example.com".to_string(),
            created_at: "2024-03-01T15:30:00Z".parse().unwrap(),
            source: SourceDb::Korea,
        }
    }

    #[test]
    fn history_csv_uses_kst_and_quotes() {
        let csv = history_csv(&[entry(5_000), entry(-1_000)]).unwrap();
        assert!(csv.starts_with(BOM));
        let lines: Vec<&str> = csv.trim_start_matches(BOM).lines().collect();
        assert_eq!(lines[0], "날짜,시간,크리에이터,이메일,유형,포인트,사유,캠페인,DB");
        assert_eq!(
            lines[1],
            "2024-03-02,00:30:00,이하늘,sky@example.com,지급,5000,\"이벤트, \"\"특별\"\" 지급\",,한국"
        );
        assert!(lines[2].contains(",차감,-1000,"));
    }

    #[test]
    fn empty_audit_export_is_rejected() {
        assert!(matches!(audit_csv(&[]), Err(AppError::UnprocessableEntity(_))));
    }

    #[test]
    fn attachment_name_is_encoded() {
        let header = attachment("출금감사", "2024-05-31T16:00:00Z".parse().unwrap());
        assert!(header.starts_with("attachment; filename=\"export.csv\"; filename*=UTF-8''"));
        assert!(header.ends_with("_20240601.csv"));
        assert!(!header.contains("출금"));
    }
}
