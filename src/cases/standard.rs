use serde_json::json;

use crate::domain::{DigestAlgorithm, ExpectationSpec, FixtureSpec, TestCase};

const PEOPLE: &str = r#"[{"name":"Alice","age":55},{"name":"Bob","age":30},{"name":"Charlie","age":55},{"name":"Dave","age":30}]"#;

const README: &str = "# Test Heading\n\nThis is a test README file.\n* Bullet point\n* Another bullet point\n";

/// The built-in suite, used when no case file is given.
pub fn standard_suite() -> Vec<TestCase> {
    vec![
        TestCase::new(
            "wednesday-count",
            "How many Wednesdays are there in the date range 1985-09-10 to 2011-10-02?",
            ExpectationSpec::exact("1360"),
        ),
        TestCase::new(
            "json-sort-by-age",
            format!("Sort this JSON array by age and then by name: {PEOPLE}"),
            ExpectationSpec::json(json!([
                {"name": "Bob", "age": 30},
                {"name": "Dave", "age": 30},
                {"name": "Alice", "age": 55},
                {"name": "Charlie", "age": 55}
            ])),
        )
        .with_fixture(FixtureSpec::InlineLiteral),
        TestCase::new(
            "csv-extract-answer",
            "Download and unzip file which has a single extract.csv file inside. \
             What is the value in the \"answer\" column of the CSV file?",
            ExpectationSpec::exact("test_answer"),
        )
        .with_fixture(FixtureSpec::archive(
            "q-extract-csv-zip.zip",
            [("extract.csv", "id,answer,value\n1,test_answer,42\n")],
        )),
        TestCase::new(
            "prettier-readme-hash",
            "Download README.md. In the directory where you downloaded it, make sure it is called \
             README.md, and run npx -y prettier@3.4.2 README.md | sha256sum. \
             What is the output of the command?",
            ExpectationSpec::HashOfExternalCommand {
                algorithm: DigestAlgorithm::Sha256,
            },
        )
        .with_fixture(FixtureSpec::text("README.md", README)),
        TestCase::new(
            "sheets-sequence-sum",
            "In Google Sheets, what is the result of this formula: \
             =SUM(ARRAY_CONSTRAIN(SEQUENCE(100, 100, 0, 8), 1, 10))?",
            ExpectationSpec::numeric(360.0, 0.0),
        ),
        TestCase::new(
            "key-value-lookup",
            "The attached config.txt holds key=value lines. What is the value of the key \"answer\"?",
            ExpectationSpec::exact("forty-two"),
        )
        .with_fixture(FixtureSpec::text(
            "config.txt",
            "name=qaprobe\nmode=verify\nanswer=forty-two\n",
        )),
    ]
}
