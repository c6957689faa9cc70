use shared::{
    error::ApiError,
    protocol::{NewQuestion, QuestionDraft},
};

/// Field-presence validation for the admin question body. Runs at handler
/// entry, before any service call; messages name the offending field.
pub fn question_draft(draft: &QuestionDraft) -> Result<NewQuestion, ApiError> {
    let index = draft.index.ok_or_else(|| invalid_field("index"))?;
    let title = required_text(draft.title.as_deref(), "title")?;
    let question = required_text(draft.question.as_deref(), "question")?;
    let answer = required_text(draft.answer.as_deref(), "answer")?;
    let is_legendary = draft.is_legendary.ok_or_else(|| invalid_field("isLegendary"))?;

    Ok(NewQuestion {
        index,
        title,
        question,
        img_url: optional_text(draft.img_url.as_deref()),
        clue: optional_text(draft.clue.as_deref()),
        answer,
        is_legendary,
    })
}

fn required_text(value: Option<&str>, field: &str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(invalid_field(field)),
    }
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn invalid_field(field: &str) -> ApiError {
    ApiError::validation(format!("Invalid field '{field}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_draft() -> QuestionDraft {
        QuestionDraft {
            index: Some(3),
            title: Some("The sphinx".to_string()),
            question: Some("What walks on four legs in the morning?".to_string()),
            img_url: Some("https://example.com/sphinx.png".to_string()),
            clue: Some("  ".to_string()),
            answer: Some("man".to_string()),
            is_legendary: Some(true),
        }
    }

    #[test]
    fn accepts_full_draft_and_drops_blank_optionals() {
        let question = question_draft(&full_draft()).expect("valid");
        assert_eq!(question.index, 3);
        assert_eq!(question.title, "The sphinx");
        assert_eq!(
            question.img_url.as_deref(),
            Some("https://example.com/sphinx.png")
        );
        assert_eq!(question.clue, None, "blank clue becomes absent");
        assert!(question.is_legendary);
    }

    #[test]
    fn each_missing_required_field_is_named() {
        let mut draft = full_draft();
        draft.index = None;
        assert_eq!(
            question_draft(&draft).expect_err("index").message,
            "Invalid field 'index'"
        );

        let mut draft = full_draft();
        draft.title = Some("   ".to_string());
        assert_eq!(
            question_draft(&draft).expect_err("title").message,
            "Invalid field 'title'"
        );

        let mut draft = full_draft();
        draft.question = None;
        assert_eq!(
            question_draft(&draft).expect_err("question").message,
            "Invalid field 'question'"
        );

        let mut draft = full_draft();
        draft.answer = Some(String::new());
        assert_eq!(
            question_draft(&draft).expect_err("answer").message,
            "Invalid field 'answer'"
        );

        let mut draft = full_draft();
        draft.is_legendary = None;
        assert_eq!(
            question_draft(&draft).expect_err("isLegendary").message,
            "Invalid field 'isLegendary'"
        );
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let mut draft = full_draft();
        draft.img_url = None;
        draft.clue = None;
        let question = question_draft(&draft).expect("valid");
        assert_eq!(question.img_url, None);
        assert_eq!(question.clue, None);
    }
}
