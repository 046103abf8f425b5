// src/cache/keys.rs

pub fn examination(examination_id: i64) -> String {
    format!("examination:{}", examination_id)
}

pub fn question(question_id: i64) -> String {
    format!("question:{}", question_id)
}

pub fn examination_questions(examination_id: i64) -> String {
    format!("examination_questions:{}", examination_id)
}

pub fn attempt(credential_id: i64, examination_id: i64) -> String {
    format!("attempt:{}:{}", credential_id, examination_id)
}

pub fn order(order_id: &str) -> String {
    format!("order:{}", order_id)
}
