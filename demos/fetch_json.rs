use budstikke::client::RestClient;
use budstikke::request::ArgValue;
use budstikke::retry::{RetryPolicy, retry};
use budstikke::signature::{MethodDecl, MethodTable, ParamDecl, ReturnShape};
use budstikke::spec::{ClientSpec, FailureCategory};
use snafu::prelude::*;

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), snafu::Whatever> {
    let base_url =
        std::env::var("BASE_URL").whatever_context("Failed to get BASE_URL (try https://httpbin.org)")?;

    let mut methods = MethodTable::new();
    methods
        .declare(
            "anything",
            &MethodDecl::builder()
                .paths(["/anything/{tag}"])
                .produces(["application/json"])
                .params(vec![ParamDecl::Path, ParamDecl::query("verbose")])
                .returns(ReturnShape::Value)
                .build(),
        )
        .whatever_context("Failed to declare method")?;

    let client = RestClient::builder()
        .spec(
            ClientSpec::builder()
                .name("demo")
                .retry_on_status(vec![502, 503])
                .retry_on(vec![FailureCategory::Connect])
                .build(),
        )
        .base_url(base_url.as_str())
        .whatever_context("BASE_URL is not a valid URI")?
        .methods(methods)
        .http_client(reqwest::Client::new())
        .retry_enabled(true)
        .build();

    let args = [Some(ArgValue::text("budstikke")), Some(ArgValue::text(true))];
    let body: Option<serde_json::Value> = retry(RetryPolicy::default(), || {
        client.call("anything", &args)
    })
    .await
    .whatever_context("Remote call failed")?;

    println!("{body:#?}");

    Ok(())
}
