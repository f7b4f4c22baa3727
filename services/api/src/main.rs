use applicant_wizard_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("applicant wizard error: {err}");
        std::process::exit(1);
    }
}
