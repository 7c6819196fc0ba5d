use anyhow::{bail, Result};
use take_test::utils::logging;
use take_test::{App, Config};

const USAGE: &str = "用法: take_test <login <email> <password> | my-tests | take <test_id> | resume | history <test_id>>";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load();

    // 初始化日志
    logging::init(config.verbose_logging);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    // 初始化应用
    let app = App::initialize(config)?;

    match args.as_slice() {
        ["login", email, password] => app.login(email, password).await?,
        ["my-tests"] => app.list_my_tests().await?,
        ["take", test_id] => app.take(test_id).await?,
        ["resume"] => app.run_attempt().await?,
        ["history", test_id] => app.history(test_id).await?,
        _ => bail!(USAGE),
    }

    Ok(())
}
