use std::{thread, time::Duration};

fn main() -> anyhow::Result<()> {
	loop {
		println!("\n");
		for (index, name) in rtnl::list_links(None)? {
			let up = rtnl::is_up(&name).unwrap_or(false);
			println!("{index:>3}: {name:<16} {}", if up { "UP" } else { "DOWN" });
		}

		thread::sleep(Duration::from_secs(5));
	}
}
