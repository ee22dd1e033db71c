use colored::Colorize as _;
use std::error::Error;
use std::process;

type FixtureResult = Result<(), Box<dyn Error>>;

macro_rules! tests {
  ($($name:expr, $module:ident),*) => {
    // declare the modules for all tests
    $(
      mod $module;
    )*

    // list of all available integration tests
    const TEST_NAMES: &[&str] = &[$( $name ),*];

    // run a given test; `None` if there is no such test
    fn run_test(name: &str) -> Option<FixtureResult> {
      $(
        if name == $name {
          return Some($module::fixture());
        }
      )*

      None
    }
  }
}

tests! {
  "scenarios", scenarios,
  "draw-no-vertices", draw_no_vertices,
  "drop-framebuffer", drop_framebuffer,
  "uniform-reflection", uniform_reflection,
  "lit-quad", lit_quad
}

fn print_test_names() {
  for test_name in TEST_NAMES {
    println!("  -> {}", test_name.blue());
  }
}

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let Some(test_name) = std::env::args().nth(1) else {
    println!("Please provide a test name. Possible values");
    print_test_names();
    process::exit(2);
  };

  println!("test name: {}", test_name.green());

  match run_test(&test_name) {
    Some(Ok(())) => println!("{}", "ok".green()),

    Some(Err(e)) => {
      log::error!("{} failed: {}", test_name, e);
      process::exit(1);
    }

    None => {
      println!("{} is not a valid test. Possible values", test_name.red());
      print_test_names();
      process::exit(2);
    }
  }
}
