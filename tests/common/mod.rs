//! Shared source-tree fixture for integration tests.
//!
//! Module graph:
//! - `net` -> `kernel` -> `util.c`
//! - `ser` -> `timer`, `util.c`
//! - `foo` gates `bar` through `CONFIG_FOO` (set)
//! - `ser` gates `bar` through `CONFIG_SER_STROBE` (clear)
//! - `cyc_a` <-> `cyc_b`
//! - `adc` supports `arm` only, `mystery` uses an undeclared tag

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use modforge::{Catalog, CatalogLoader, Config, CpuInfo, ProjectDescriptor};

pub const KERNEL_CFG: &str = "\
#ifndef CFG_KERNEL_H
#define CFG_KERNEL_H

/**
 * Kernel enabled.
 * $WIZ$ type = \"autoenabled\"
 */
#define CONFIG_KERN 0

/**
 * Preemptive scheduling.
 * $WIZ$ type = \"boolean\"
 */
#define CONFIG_KERN_PREEMPT 1

/// Process stack size.
#define CONFIG_KERN_STACK 512UL

#endif /* CFG_KERNEL_H */
";

pub const SER_CFG: &str = "\
#ifndef CFG_SER_H
#define CFG_SER_H

/**
 * Receive timeout in ms.
 * $WIZ$ type = \"int\"; min = 0; max = 255
 */
#define CONFIG_SER_RXTIMEOUT 10UL

/**
 * Default port.
 * $WIZ$ value_list = \"ser_ports\"
 */
#define CONFIG_SER_PORT SER_UART0

/**
 * Strobe line for debugging.
 * $WIZ$ type = \"boolean\"; conditional_deps = (\"bar\",)
 */
#define CONFIG_SER_STROBE 0

#define CONFIG_SER_NAME \"uart\" ///< Device name

#endif /* CFG_SER_H */
";

pub const FOO_CFG: &str = "\
/**
 * Foo needs bar.
 * $WIZ$ type = \"boolean\"; conditional_deps = \"bar\"
 */
#define CONFIG_FOO 1
";

pub const NET_CFG: &str = "\
/**
 * Maximum sockets.
 * $WIZ$ type = \"int\"; min = 1; max = 16
 */
#define CONFIG_NET_SOCKETS 4
";

/// A scratch source tree rooted at `<tmp>/bertos`, with a separate output directory
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self {
            dir: TempDir::new().unwrap(),
        };
        fixture.write(
            "kern/kernel.h",
            "/**\n * \\brief Process scheduler\n *\n * $WIZ$ module_name = \"kernel\"\n * $WIZ$ module_depends = \"util.c\"\n * $WIZ$ module_configuration = \"cfg/cfg_kernel.h\"\n * $WIZ$ module_harvard = \"both\"\n */\n",
        );
        fixture.write("kern/kernel.c", "");
        fixture.write(
            "drv/timer.h",
            "/**\n * \\brief Hardware timer\n * $WIZ$ module_name = \"timer\"\n * $WIZ$ module_hw = (\"hw/hw_timer.c\", \"hw/hw_timer.h\")\n */\n",
        );
        fixture.write("drv/timer.c", "");
        fixture.write("drv/timer_avr.c", "");
        fixture.write(
            "drv/ser.h",
            "/**\n * \\brief Serial driver\n * $WIZ$ module_name = \"ser\"\n * $WIZ$ module_depends = (\"timer\", \"util.c\")\n * $WIZ$ module_configuration = \"cfg/cfg_ser.h\"\n * $WIZ$ ser_fifo_size = 32\n */\n\n/**\n * $WIZ$ ser_ports = (\"SER_UART0\", \"SER_UART1\")\n */\n",
        );
        fixture.write("drv/ser.c", "");
        fixture.write(
            "net/net.h",
            "/**\n * \\brief Network stack\n * $WIZ$ module_name = \"net\"\n * $WIZ$ module_depends = (\"kernel\",)\n * $WIZ$ module_configuration = \"cfg/cfg_net.h\"\n */\n",
        );
        fixture.write("net/net.c", "");
        fixture.write(
            "mware/foo.h",
            "/**\n * \\brief Foo\n * $WIZ$ module_name = \"foo\"\n * $WIZ$ module_configuration = \"cfg/cfg_foo.h\"\n * $WIZ$ module_harvard = \"pgm\"\n */\n",
        );
        fixture.write("mware/foo.c", "");
        fixture.write(
            "mware/bar.h",
            "/**\n * \\brief Bar\n * $WIZ$ module_name = \"bar\"\n */\n",
        );
        fixture.write("mware/bar.c", "");
        fixture.write("mware/util.c", "");
        fixture.write(
            "cyc/cyc_a.h",
            "/** $WIZ$ module_name = \"cyc_a\"; module_depends = \"cyc_b\" */\n",
        );
        fixture.write(
            "cyc/cyc_b.h",
            "/** $WIZ$ module_name = \"cyc_b\"; module_depends = \"cyc_a\" */\n",
        );
        fixture.write(
            "drv/adc.h",
            "/** $WIZ$ module_name = \"adc\"; module_supports = \"arm\" */\n",
        );
        fixture.write(
            "drv/mystery.h",
            "/** $WIZ$ module_name = \"mystery\"; module_supports = \"not mystery_tag\" */\n",
        );
        fixture.write("cfg/cfg_kernel.h", KERNEL_CFG);
        fixture.write("cfg/cfg_ser.h", SER_CFG);
        fixture.write("cfg/cfg_foo.h", FOO_CFG);
        fixture.write("cfg/cfg_net.h", NET_CFG);
        fixture
    }

    pub fn source_root(&self) -> PathBuf {
        self.dir.path().join("bertos")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn write(&self, rel: &str, text: &str) {
        let path = self.source_root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    pub fn catalog(&self) -> Catalog {
        self.catalog_with_tags(&[])
    }

    pub fn catalog_with_tags(&self, tags: &[String]) -> Catalog {
        CatalogLoader::new(&Config::default())
            .with_tags(tags)
            .load(&self.source_root())
            .unwrap()
    }

    pub fn project(&self, cpu: CpuInfo) -> ProjectDescriptor {
        let mut project = ProjectDescriptor::new("demo", self.source_root(), self.output_dir(), cpu);
        project.clock_frequency = "16000000".to_string();
        project.known_tags = vec![
            "arm".to_string(),
            "avr".to_string(),
            "harvard".to_string(),
        ];
        project
    }

    pub fn read_output(&self, rel: &str) -> String {
        fs::read_to_string(self.output_dir().join(rel)).unwrap()
    }
}

pub fn avr() -> CpuInfo {
    CpuInfo {
        name: "atmega64".to_string(),
        tags: vec!["avr".to_string(), "harvard".to_string()],
        toolchain: "avr".to_string(),
        ..Default::default()
    }
}

pub fn cortex() -> CpuInfo {
    CpuInfo {
        name: "lm3s1968".to_string(),
        tags: vec!["arm".to_string()],
        toolchain: "arm".to_string(),
        ..Default::default()
    }
}

pub fn enabled(catalog: &Catalog) -> Vec<String> {
    catalog.enabled_modules().map(|m| m.name.clone()).collect()
}

pub fn exists(root: &Path, rel: &str) -> bool {
    root.join(rel).exists()
}
