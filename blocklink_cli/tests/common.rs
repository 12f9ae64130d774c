use assert_cmd::Command;

pub fn blocklink_cmd() -> Command {
	let mut cmd = Command::cargo_bin("blocklink")
		.unwrap_or_else(|error| panic!("blocklink binary is missing: {error}"));
	cmd.env("NO_COLOR", "1");
	cmd
}
